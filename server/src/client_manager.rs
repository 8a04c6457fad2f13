//! Connection admission and outbound routing.
//!
//! This module tracks every admitted connection regardless of role:
//! - Capacity enforcement before any protocol event is handled
//! - The outbound queue used to reach each connection
//! - Liveness, so connections that vanish without closing are reclaimed
//!
//! Sends are fire-and-forget. A closed queue means the transport is already
//! tearing the connection down and a Disconnect event is on its way.

use bingo_shared::{ConnectionId, ServerPacket};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Handle used to push packets towards one connection's writer task.
pub type Outbound = mpsc::UnboundedSender<ServerPacket>;

/// An admitted connection.
#[derive(Debug)]
pub struct Client {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    /// Last time any frame, including a pong, arrived from this connection.
    pub last_seen: Instant,
    outbound: Outbound,
}

impl Client {
    pub fn new(id: ConnectionId, addr: SocketAddr, outbound: Outbound) -> Self {
        let now = Instant::now();
        Self {
            id,
            addr,
            connected_at: now,
            last_seen: now,
            outbound,
        }
    }

    /// Records activity from the peer.
    pub fn touch(&mut self, now: Instant) {
        self.last_seen = now;
    }

    /// Checks whether the peer has gone quiet for longer than `timeout`.
    ///
    /// The transport pings every connection periodically, so a healthy
    /// peer answers with a pong well inside the timeout even when it has
    /// nothing to say. Silence past it means the socket is half-open.
    pub fn is_timed_out(&self, timeout: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_seen) > timeout
    }

    /// Queues a packet. Returns false if the writer side is gone.
    pub fn send(&self, packet: ServerPacket) -> bool {
        self.outbound.send(packet).is_ok()
    }
}

/// Owns the fixed pool of connection slots.
pub struct ClientManager {
    clients: HashMap<ConnectionId, Client>,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
        }
    }

    /// Admits a connection if a slot is free.
    ///
    /// On rejection the outbound handle is returned so the caller can tell
    /// the peer why before dropping it.
    pub fn add_client(
        &mut self,
        id: ConnectionId,
        addr: SocketAddr,
        outbound: Outbound,
    ) -> Result<(), Outbound> {
        if self.clients.len() >= self.max_clients || self.clients.contains_key(&id) {
            return Err(outbound);
        }

        info!("Connection {} admitted from {}", id, addr);
        self.clients.insert(id, Client::new(id, addr, outbound));
        Ok(())
    }

    /// Frees a slot. Dropping the client closes its outbound queue, which
    /// makes the writer task close the socket.
    pub fn remove_client(&mut self, id: ConnectionId) -> bool {
        match self.clients.remove(&id) {
            Some(client) => {
                info!(
                    "Connection {} released after {:.1}s",
                    client.id,
                    client.connected_at.elapsed().as_secs_f32()
                );
                true
            }
            None => false,
        }
    }

    /// Checks whether `id` currently holds a slot.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.clients.contains_key(&id)
    }

    /// Marks a connection as alive. Unknown ids are ignored.
    pub fn touch(&mut self, id: ConnectionId, now: Instant) {
        if let Some(client) = self.clients.get_mut(&id) {
            client.touch(now);
        }
    }

    /// Checks for and removes timed-out connections
    ///
    /// Frees the slot of every connection silent for longer than `timeout`
    /// and returns their ids, sorted, so the caller can release whatever
    /// they held in the game. A zero timeout disables the check.
    pub fn check_timeouts(&mut self, timeout: Duration, now: Instant) -> Vec<ConnectionId> {
        if timeout.is_zero() {
            return Vec::new();
        }

        let mut timed_out: Vec<ConnectionId> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout, now))
            .map(|client| client.id)
            .collect();
        timed_out.sort_unstable();

        for id in &timed_out {
            warn!("Connection {} timed out after {:?} of silence", id, timeout);
            self.remove_client(*id);
        }

        timed_out
    }

    /// Queues a packet for one connection. Unknown ids and closed queues
    /// are dropped silently.
    pub fn send(&self, id: ConnectionId, packet: ServerPacket) {
        match self.clients.get(&id) {
            Some(client) => {
                if !client.send(packet) {
                    debug!("Dropped packet for closing connection {}", id);
                }
            }
            None => debug!("Dropped packet for unknown connection {}", id),
        }
    }

    /// Total number of slots, admitted or free.
    pub fn capacity(&self) -> usize {
        self.max_clients
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
