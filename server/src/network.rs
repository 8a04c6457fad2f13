//! Server network layer: WebSocket transport and the coordinator loop

use crate::session::{ServerMessage, Session};
use bingo_shared::{ClientPacket, ConnectionId, ServerPacket};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// How often every connection is pinged. Pongs keep it alive in the session.
const PING_INTERVAL: Duration = Duration::from_secs(1);
/// Upper bound on one socket write before the peer is considered gone.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Main server coordinating transport tasks and the session
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    session: Session,
    broadcast_interval: Duration,
}

impl Server {
    pub async fn new(
        addr: &str,
        session: Session,
        broadcast_interval: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        Ok(Server {
            listener: Some(listener),
            local_addr,
            session,
            broadcast_interval,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawns task that accepts sockets and hands each its own connection id
    fn spawn_acceptor(listener: TcpListener, server_tx: mpsc::UnboundedSender<ServerMessage>) {
        tokio::spawn(async move {
            let mut next_client_id: ConnectionId = 1;

            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let client_id = next_client_id;
                        next_client_id = next_client_id.wrapping_add(1);
                        tokio::spawn(handle_connection(stream, addr, client_id, server_tx.clone()));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Main server loop. Events and broadcast ticks are applied one at a
    /// time against the single session.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = self.listener.take().ok_or("server is already running")?;
        let (server_tx, mut server_rx) = mpsc::unbounded_channel();
        Self::spawn_acceptor(listener, server_tx);

        let mut tick_interval = interval(self.broadcast_interval);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = server_rx.recv() => {
                    match message {
                        Some(message) => self.session.handle_message(message),
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.session.tick(Instant::now());
                },
            }
        }

        Ok(())
    }
}

/// Decodes one text frame. The error string is what the sender is told.
pub fn decode_packet(text: &str) -> Result<ClientPacket, String> {
    serde_json::from_str(text).map_err(|e| format!("Malformed message: {}", e))
}

/// Runs one connection: handshake, then a writer task draining the outbound
/// queue and pinging the peer, and a read loop forwarding decoded frames to
/// the session. The read loop ends once the writer does, so a connection the
/// session dropped does not linger in `frames.next()`.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    client_id: ConnectionId,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };
    let (mut sink, mut frames) = ws.split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ServerPacket>();

    if server_tx
        .send(ServerMessage::Connected {
            client_id,
            addr,
            outbound,
        })
        .is_err()
    {
        return;
    }

    // Ends when the session drops this connection's outbound handle, or
    // when a write stalls or fails.
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = interval(PING_INTERVAL);
        ping_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let frame = tokio::select! {
                packet = outbound_rx.recv() => match packet {
                    Some(packet) => match serde_json::to_string(&packet) {
                        Ok(text) => Message::Text(text),
                        Err(e) => {
                            error!("Failed to encode packet for {}: {}", client_id, e);
                            continue;
                        }
                    },
                    None => break,
                },
                _ = ping_interval.tick() => Message::Ping(Vec::new()),
            };

            match timeout(WRITE_TIMEOUT, sink.send(frame)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!("Send to connection {} failed: {}", client_id, e);
                    return;
                }
                Err(_) => {
                    warn!("Send to connection {} stalled, dropping it", client_id);
                    return;
                }
            }
        }
        let _ = timeout(WRITE_TIMEOUT, sink.close()).await;
    });

    let reason = loop {
        let next = tokio::select! {
            next = frames.next() => next,
            _ = &mut writer => break "connection closed by server".to_string(),
        };

        let message = match next {
            Some(Ok(Message::Text(text))) => match decode_packet(&text) {
                Ok(packet) => ServerMessage::PacketReceived { client_id, packet },
                Err(reason) => ServerMessage::Rejected { client_id, reason },
            },
            Some(Ok(Message::Binary(_))) => ServerMessage::Rejected {
                client_id,
                reason: "Binary frames are not supported".to_string(),
            },
            Some(Ok(Message::Close(frame))) => {
                break frame
                    .map(|frame| frame.reason.to_string())
                    .filter(|reason| !reason.is_empty())
                    .unwrap_or_else(|| "closed by peer".to_string());
            }
            // Pings are answered by the protocol layer; both directions
            // prove the peer is alive.
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                ServerMessage::Heartbeat { client_id }
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => break e.to_string(),
            None => break "connection reset".to_string(),
        };

        if server_tx.send(message).is_err() {
            break "server shutting down".to_string();
        }
    };

    let _ = server_tx.send(ServerMessage::Disconnected { client_id, reason });
}
