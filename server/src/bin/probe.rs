//! Command line probe: joins a running session and prints what it receives.

use bingo_shared::{ClientPacket, Role, ServerPacket, Snapshot};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server WebSocket URL
    #[clap(short, long, default_value = "ws://127.0.0.1:4000")]
    url: String,
    /// Display name to join with
    #[clap(short, long, default_value = "probe")]
    name: String,
    /// Reconnection secret
    #[clap(short, long)]
    secret: Option<String>,
    /// Join as admin instead of player
    #[clap(long)]
    admin: bool,
    /// Advance the phase once after joining (admin only)
    #[clap(long)]
    advance: bool,
    /// Exit after this many packets
    #[clap(short, long, default_value = "5")]
    count: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Connecting to {}", args.url);
    let (ws, _) = connect_async(args.url.as_str()).await?;
    let (mut sink, mut stream) = ws.split();

    let join = ClientPacket::Join {
        name: Some(args.name.clone()),
        role: if args.admin { Role::Admin } else { Role::Player },
        secret: args.secret.clone(),
    };
    sink.send(Message::Text(serde_json::to_string(&join)?)).await?;

    if args.advance {
        let advance = serde_json::to_string(&ClientPacket::AdvancePhase)?;
        sink.send(Message::Text(advance)).await?;
    }

    let mut received = 0;
    while received < args.count {
        let Some(frame) = stream.next().await else {
            println!("Server closed the connection");
            break;
        };
        let Message::Text(text) = frame? else {
            continue;
        };
        received += 1;

        match serde_json::from_str::<ServerPacket>(&text)? {
            ServerPacket::Init { phase, name, card } => {
                println!("Joined as {} with card #{} during {:?}", name, card.card_no, phase);
                for row in &card.content {
                    let cells: Vec<String> = row
                        .iter()
                        .map(|cell| cell.map_or("__".to_string(), |n| format!("{:2}", n)))
                        .collect();
                    println!("  {}", cells.join(" "));
                }
            }
            ServerPacket::Update(Snapshot::Player(view)) => {
                println!("Update: {:?}, {} players", view.phase, view.players.len());
            }
            ServerPacket::Update(Snapshot::Admin(view)) => {
                println!(
                    "Admin update: {:?}, {} players, {} cards free",
                    view.phase,
                    view.players.len(),
                    view.available_cards.len()
                );
            }
            ServerPacket::Error { message } => println!("Error: {}", message),
            other => println!("Received: {:?}", other),
        }
    }

    let _ = sink.close().await;
    Ok(())
}
