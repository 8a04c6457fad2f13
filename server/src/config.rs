use crate::card_pool::CardPool;
use crate::catalog::{Catalog, CatalogError};
use crate::session::SessionConfig;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Command line configuration for the session server.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct Config {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    pub host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "4000")]
    pub port: u16,
    /// Maximum number of concurrent connections, all roles included
    #[clap(short, long, default_value = "32")]
    pub max_connections: usize,
    /// Full-state broadcasts per second
    #[clap(short = 'r', long, default_value = "1")]
    pub broadcast_rate: u32,
    /// Seconds a dropped player's card stays reserved for reconnection
    #[clap(short = 'g', long, default_value = "30")]
    pub reconnect_grace: u64,
    /// Seconds without any frame, pongs included, before a connection is dropped (0 disables)
    #[clap(short = 't', long, default_value = "20")]
    pub client_timeout: u64,
    /// Card catalog file, one card per line (defaults to the built-in set)
    #[clap(long)]
    pub catalog: Option<PathBuf>,
    /// Seed for card draws, for reproducible sessions
    #[clap(long)]
    pub seed: Option<u64>,
}

impl Config {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.broadcast_rate.max(1)))
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            max_connections: self.max_connections,
            reconnect_grace: Duration::from_secs(self.reconnect_grace),
            client_timeout: Duration::from_secs(self.client_timeout),
        }
    }

    pub fn load_catalog(&self) -> Result<Catalog, CatalogError> {
        match &self.catalog {
            Some(path) => Catalog::from_file(path),
            None => Catalog::builtin(),
        }
    }

    pub fn card_pool(&self, catalog: Arc<Catalog>) -> CardPool {
        match self.seed {
            Some(seed) => CardPool::with_rng(catalog, StdRng::seed_from_u64(seed)),
            None => CardPool::new(catalog),
        }
    }
}
