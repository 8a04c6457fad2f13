use bingo_server::config::Config;
use bingo_server::network::Server;
use bingo_server::session::Session;
use clap::Parser;
use log::info;
use std::sync::Arc;

/// Parses flags, loads the card catalog and runs the session server until
/// Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();

    let catalog = Arc::new(config.load_catalog()?);
    info!("Loaded {} cards", catalog.len());

    let session = Session::new(config.card_pool(catalog), &config.session());
    let mut server = Server::new(&config.address(), session, config.broadcast_interval()).await?;

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
