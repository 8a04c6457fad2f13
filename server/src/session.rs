//! Session coordinator.
//!
//! The single owner of all session state. Transport tasks feed it
//! [`ServerMessage`]s through one ordered queue; each message is applied in
//! full before the next one is looked at, so card exclusivity, the singleton
//! roles and per-toggle scores never observe a half-applied event.

use crate::broadcast;
use crate::card_pool::CardPool;
use crate::client_manager::{ClientManager, Outbound};
use crate::error::SessionError;
use crate::game::GameState;
use crate::registry::{PlayerRegistry, Reassignment};
use bingo_shared::{ClientPacket, ConnectionId, Coord, Phase, Role, ServerPacket};
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

const NAME_MAX_CHARS: usize = 10;
const DEFAULT_NAME: &str = "Anonymous";
const NAME_EXTRA_CHARS: &str = "üğşiöçÜĞŞİÖÇ";

/// Events delivered from the transport to the coordinator.
#[derive(Debug)]
pub enum ServerMessage {
    Connected {
        client_id: ConnectionId,
        addr: SocketAddr,
        outbound: Outbound,
    },
    PacketReceived {
        client_id: ConnectionId,
        packet: ClientPacket,
    },
    /// A frame that failed boundary validation.
    Rejected {
        client_id: ConnectionId,
        reason: String,
    },
    /// A control frame (pong or ping) proving the peer is still there.
    Heartbeat { client_id: ConnectionId },
    Disconnected {
        client_id: ConnectionId,
        reason: String,
    },
}

/// Coordinator settings, independent of how they were parsed.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_connections: usize,
    /// How long a dropped player's card stays reserved for it.
    pub reconnect_grace: Duration,
    /// Silence after which a connection is treated as dropped. Zero
    /// disables the check.
    pub client_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_connections: 32,
            reconnect_grace: Duration::from_secs(30),
            client_timeout: Duration::from_secs(20),
        }
    }
}

pub struct Session {
    pool: CardPool,
    registry: PlayerRegistry,
    game: GameState,
    clients: ClientManager,
    reconnect_grace: Duration,
    client_timeout: Duration,
}

impl Session {
    pub fn new(pool: CardPool, config: &SessionConfig) -> Self {
        Self {
            pool,
            registry: PlayerRegistry::new(),
            game: GameState::new(),
            clients: ClientManager::new(config.max_connections),
            reconnect_grace: config.reconnect_grace,
            client_timeout: config.client_timeout,
        }
    }

    /// Applies one transport event. Any inbound frame counts as a sign of
    /// life for its connection.
    pub fn handle_message(&mut self, message: ServerMessage) {
        match &message {
            ServerMessage::PacketReceived { client_id, .. }
            | ServerMessage::Rejected { client_id, .. }
            | ServerMessage::Heartbeat { client_id } => {
                self.clients.touch(*client_id, Instant::now());
            }
            ServerMessage::Connected { .. } | ServerMessage::Disconnected { .. } => {}
        }

        match message {
            ServerMessage::Connected {
                client_id,
                addr,
                outbound,
            } => {
                // Rejection has already been reported to the peer.
                let _ = self.connect(client_id, addr, outbound);
            }
            ServerMessage::PacketReceived { client_id, packet } => {
                self.handle_packet(client_id, packet);
            }
            ServerMessage::Rejected { client_id, reason } => {
                if self.clients.contains(client_id) {
                    warn!("Rejected frame from connection {}: {}", client_id, reason);
                    self.clients
                        .send(client_id, ServerPacket::Error { message: reason });
                }
            }
            ServerMessage::Heartbeat { .. } => {}
            ServerMessage::Disconnected { client_id, reason } => {
                self.disconnect(client_id, &reason);
            }
        }
    }

    /// Admits a connection into a free slot. A full session answers the
    /// peer with an error and drops its outbound queue, which closes it.
    pub fn connect(
        &mut self,
        id: ConnectionId,
        addr: SocketAddr,
        outbound: Outbound,
    ) -> Result<(), SessionError> {
        match self.clients.add_client(id, addr, outbound) {
            Ok(()) => Ok(()),
            Err(outbound) => {
                warn!(
                    "Rejecting connection {} from {}: {} of {} slots in use",
                    id,
                    addr,
                    self.clients.len(),
                    self.clients.capacity()
                );
                let _ = outbound.send(ServerPacket::Error {
                    message: SessionError::SessionFull.to_string(),
                });
                Err(SessionError::SessionFull)
            }
        }
    }

    /// Dispatches a decoded packet. Packets from connections that were never
    /// admitted are ignored.
    pub fn handle_packet(&mut self, id: ConnectionId, packet: ClientPacket) {
        if !self.clients.contains(id) {
            debug!("Ignoring packet from unadmitted connection {}", id);
            return;
        }

        let result = match packet {
            ClientPacket::Join { name, role, secret } => self.join(id, name, role, secret),
            ClientPacket::Toggle { x, y } => self.toggle(id, Coord::new(x, y)),
            ClientPacket::Rejoin { keep_same_card } => self.rejoin(id, keep_same_card),
            ClientPacket::Command { payload } => self.command(id, payload),
            ClientPacket::AdvancePhase => self.advance_phase(id),
        };

        match result {
            Ok(()) => {}
            Err(SessionError::NotFound) => debug!("Lookup miss for connection {}", id),
            Err(err) => {
                warn!("Request from connection {} failed: {}", id, err);
                self.send_error(id, &err);
            }
        }
    }

    fn join(
        &mut self,
        id: ConnectionId,
        name: Option<String>,
        role: Role,
        secret: Option<String>,
    ) -> Result<(), SessionError> {
        if self.registry.find(id).is_some() {
            return Err(SessionError::AlreadyJoined);
        }

        // Secrets identify players only; an admin or display join never
        // takes over a player.
        if role == Role::Player {
            if let Some(old) = secret.as_deref().and_then(|s| self.registry.resolve_secret(s)) {
                return self.reconnect(id, old);
            }
        }

        match role {
            Role::Player => {
                let name = sanitize_name(name.as_deref());
                let card = self.pool.draw().ok_or(SessionError::GameFull)?;
                let card_id = card.id;
                let player = match self.registry.create(id, name, card, secret) {
                    Ok(player) => player,
                    Err(err) => {
                        self.pool.release(card_id);
                        return Err(err);
                    }
                };
                let packet = ServerPacket::Init {
                    phase: self.game.phase(),
                    name: player.name.clone(),
                    card: player.card.clone(),
                };
                self.clients.send(id, packet);
            }
            Role::Admin | Role::Display => {
                info!("Connection {} joined as {:?}", id, role);
                self.game.assign(role, id);
            }
        }

        self.broadcast();
        Ok(())
    }

    /// Hands an existing player to a new connection. Nothing is drawn and
    /// nothing is reset. If the old connection is still open it is closed.
    fn reconnect(&mut self, id: ConnectionId, old: ConnectionId) -> Result<(), SessionError> {
        let was_live = self.registry.find(old).is_some();
        // A resolved secret always points at an active or detached player,
        // so this only fails if the registry's secret index is out of sync.
        let player = self
            .registry
            .rebind(old, id)
            .ok_or(SessionError::InvalidSecret)?;

        self.clients.send(
            id,
            ServerPacket::Init {
                phase: self.game.phase(),
                name: player.name.clone(),
                card: player.card.clone(),
            },
        );
        // Replays marks so the client can redraw them.
        for coord in &player.selected {
            self.clients.send(
                id,
                ServerPacket::Add {
                    x: coord.x,
                    y: coord.y,
                    score: player.score,
                },
            );
        }

        if was_live && self.clients.remove_client(old) {
            info!("Closed stale connection {} after reconnect", old);
        }

        self.broadcast();
        Ok(())
    }

    fn toggle(&mut self, id: ConnectionId, coord: Coord) -> Result<(), SessionError> {
        if !self.game.accepts_selections() {
            debug!("Ignoring toggle from {} during {:?}", id, self.game.phase());
            return Ok(());
        }
        if !coord.in_bounds() {
            warn!("Ignoring out-of-range toggle {:?} from {}", coord, id);
            return Ok(());
        }
        let player = self.registry.find_mut(id).ok_or(SessionError::NotFound)?;

        let selected = player.toggle(coord);
        let score = player.score;
        let packet = if selected {
            ServerPacket::Add {
                x: coord.x,
                y: coord.y,
                score,
            }
        } else {
            ServerPacket::Remove {
                x: coord.x,
                y: coord.y,
                score,
            }
        };
        self.clients.send(id, packet);
        Ok(())
    }

    fn rejoin(&mut self, id: ConnectionId, keep_same_card: bool) -> Result<(), SessionError> {
        let outcome = self
            .registry
            .reassign_card(id, keep_same_card, &mut self.pool)
            .ok_or(SessionError::NotFound)?;

        if outcome == Reassignment::Exhausted {
            warn!("No spare card for connection {}, keeping its current card", id);
            self.send_error(id, &SessionError::GameFull);
        }

        if let Some(player) = self.registry.find(id) {
            self.clients.send(
                id,
                ServerPacket::Rejoined {
                    name: player.name.clone(),
                    card: player.card.clone(),
                },
            );
        }
        self.broadcast();
        Ok(())
    }

    fn command(&mut self, id: ConnectionId, payload: serde_json::Value) -> Result<(), SessionError> {
        if !self.game.is_admin(id) {
            return Err(SessionError::Unauthorized);
        }
        match self.game.display() {
            Some(display) => self.clients.send(display, ServerPacket::Screen { payload }),
            None => debug!("No display connected, dropping command"),
        }
        Ok(())
    }

    fn advance_phase(&mut self, id: ConnectionId) -> Result<(), SessionError> {
        if !self.game.is_admin(id) {
            return Err(SessionError::Unauthorized);
        }
        self.game.advance();
        self.broadcast();
        Ok(())
    }

    /// Releases everything a connection held. Safe to call for connections
    /// that never joined, or were never admitted.
    pub fn disconnect(&mut self, id: ConnectionId, reason: &str) {
        let admitted = self.clients.remove_client(id);
        if admitted {
            info!("Connection {} disconnected: {}", id, reason);
        }

        if let Some(role) = self.game.release(id) {
            info!("{:?} connection {} left", role, id);
        }

        let Some(has_secret) = self.registry.find(id).map(|p| p.secret.is_some()) else {
            return;
        };

        if has_secret && !self.reconnect_grace.is_zero() {
            self.registry.detach(id, Instant::now());
            info!(
                "Player {} detached, card held for {}s",
                id,
                self.reconnect_grace.as_secs()
            );
        } else if let Some(player) = self.registry.remove(id) {
            info!("Player {} removed, card {} released", player.name, player.card.card_no);
            self.pool.release(player.card.id);
        }
        self.broadcast();
    }

    /// Periodic work: drop connections that went silent, expire detached
    /// players, then broadcast.
    pub fn tick(&mut self, now: Instant) {
        for id in self.clients.check_timeouts(self.client_timeout, now) {
            self.disconnect(id, "timeout");
        }
        for player in self.registry.expire_detached(self.reconnect_grace, now) {
            info!(
                "Player {} did not reconnect, card {} released",
                player.name, player.card.card_no
            );
            self.pool.release(player.card.id);
        }
        self.broadcast();
    }

    /// Sends every audience its current snapshot.
    ///
    /// Called on each tick and right after any event that changes what
    /// other connections see.
    pub fn broadcast(&self) {
        broadcast::fan_out(&self.clients, &self.game, &self.registry, &self.pool);
    }

    fn send_error(&self, id: ConnectionId, err: &SessionError) {
        self.clients.send(
            id,
            ServerPacket::Error {
                message: err.to_string(),
            },
        );
    }

    pub fn phase(&self) -> Phase {
        self.game.phase()
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &CardPool {
        &self.pool
    }

    /// Number of admitted connections across all roles.
    pub fn connections(&self) -> usize {
        self.clients.len()
    }
}

/// Keeps letters, digits and the Turkish letters, capped at ten characters.
pub fn sanitize_name(raw: Option<&str>) -> String {
    let name: String = raw
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || NAME_EXTRA_CHARS.contains(*c))
        .take(NAME_MAX_CHARS)
        .collect();

    if name.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use bingo_shared::{Snapshot, CARD_WIDTH};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc::{self, UnboundedReceiver};
    use tokio_test::{assert_err, assert_ok};

    fn test_session(grace_secs: u64) -> Session {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let pool = CardPool::with_rng(catalog, StdRng::seed_from_u64(3));
        let config = SessionConfig {
            max_connections: 4,
            reconnect_grace: Duration::from_secs(grace_secs),
            client_timeout: Duration::from_secs(20),
        };
        Session::new(pool, &config)
    }

    fn open(session: &mut Session, id: ConnectionId) -> UnboundedReceiver<ServerPacket> {
        let (tx, rx) = mpsc::unbounded_channel();
        session.handle_message(ServerMessage::Connected {
            client_id: id,
            addr: "127.0.0.1:5000".parse().unwrap(),
            outbound: tx,
        });
        rx
    }

    fn drain(rx: &mut UnboundedReceiver<ServerPacket>) -> Vec<ServerPacket> {
        let mut packets = Vec::new();
        while let Ok(packet) = rx.try_recv() {
            packets.push(packet);
        }
        packets
    }

    fn join(session: &mut Session, id: ConnectionId, role: Role, secret: Option<&str>) {
        session.handle_packet(
            id,
            ClientPacket::Join {
                name: Some(format!("p{}", id)),
                role,
                secret: secret.map(str::to_string),
            },
        );
    }

    fn errors(packets: &[ServerPacket]) -> Vec<String> {
        packets
            .iter()
            .filter_map(|packet| match packet {
                ServerPacket::Error { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    fn start_playing(session: &mut Session, admin: ConnectionId) {
        join(session, admin, Role::Admin, None);
        session.handle_packet(admin, ClientPacket::AdvancePhase);
        assert_eq!(session.phase(), Phase::Playing);
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name(Some("Ada Lovelace!")), "AdaLovelac");
        assert_eq!(sanitize_name(Some("Gülşen")), "Gülşen");
        assert_eq!(sanitize_name(Some("<script>")), "script");
        assert_eq!(sanitize_name(Some("!!!")), "Anonymous");
        assert_eq!(sanitize_name(None), "Anonymous");
    }

    #[test]
    fn test_capacity_enforced_at_admission() {
        let mut session = test_session(30);
        let mut receivers: Vec<_> = (1..=4).map(|id| open(&mut session, id)).collect();
        assert_eq!(session.connections(), 4);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = session.connect(5, "127.0.0.1:5000".parse().unwrap(), tx);
        assert_eq!(assert_err!(result), SessionError::SessionFull);
        assert_eq!(errors(&drain(&mut rx)), vec!["Session is full"]);

        // Events from the rejected connection never reach the game.
        join(&mut session, 5, Role::Player, None);
        assert!(session.registry().find(5).is_none());
        assert_eq!(session.pool().len(), 24);

        session.disconnect(1, "test");
        assert_eq!(session.connections(), 3);
        let (tx, _rx) = mpsc::unbounded_channel();
        assert_ok!(session.connect(6, "127.0.0.1:5000".parse().unwrap(), tx));

        for rx in &mut receivers {
            drain(rx);
        }
    }

    #[test]
    fn test_fresh_join_sends_init() {
        let mut session = test_session(30);
        let mut rx = open(&mut session, 1);
        join(&mut session, 1, Role::Player, Some("s"));

        let packets = drain(&mut rx);
        match &packets[0] {
            ServerPacket::Init { phase, name, card } => {
                assert_eq!(*phase, Phase::Selecting);
                assert_eq!(name, "p1");
                assert!(!session.pool().contains(card.id));
            }
            other => panic!("Unexpected packet {:?}", other),
        }
        assert!(matches!(packets[1], ServerPacket::Update(Snapshot::Player(_))));
        assert_eq!(session.pool().len(), 23);
    }

    #[test]
    fn test_duplicate_join_rejected() {
        let mut session = test_session(30);
        let mut rx = open(&mut session, 1);
        join(&mut session, 1, Role::Player, None);
        let card = session.registry().find(1).unwrap().card.clone();
        drain(&mut rx);

        join(&mut session, 1, Role::Player, None);
        assert_eq!(errors(&drain(&mut rx)), vec!["Already joined"]);
        assert_eq!(session.registry().find(1).unwrap().card, card);
        assert_eq!(session.pool().len(), 23);
    }

    #[test]
    fn test_admin_and_display_roles() {
        let mut session = test_session(30);
        let _a = open(&mut session, 1);
        let _b = open(&mut session, 2);
        let mut display = open(&mut session, 3);

        join(&mut session, 1, Role::Admin, None);
        join(&mut session, 2, Role::Admin, None);
        join(&mut session, 3, Role::Display, None);

        assert_eq!(session.game().admin(), Some(2));
        assert_eq!(session.game().display(), Some(3));
        assert!(session.registry().is_empty());
        assert_eq!(session.pool().len(), 24);

        session.handle_packet(2, ClientPacket::Command { payload: json!("stars") });
        assert_eq!(
            drain(&mut display),
            vec![ServerPacket::Screen { payload: json!("stars") }]
        );
    }

    #[test]
    fn test_non_admin_cannot_steer() {
        let mut session = test_session(30);
        let _admin = open(&mut session, 1);
        let mut player = open(&mut session, 2);
        let mut display = open(&mut session, 3);
        join(&mut session, 1, Role::Admin, None);
        join(&mut session, 2, Role::Player, None);
        join(&mut session, 3, Role::Display, None);
        drain(&mut player);

        session.handle_packet(2, ClientPacket::AdvancePhase);
        session.handle_packet(2, ClientPacket::Command { payload: json!("boom") });

        assert_eq!(session.phase(), Phase::Selecting);
        assert_eq!(errors(&drain(&mut player)), vec!["Not authorized", "Not authorized"]);
        assert!(drain(&mut display).is_empty());
    }

    #[test]
    fn test_command_without_display_is_noop() {
        let mut session = test_session(30);
        let mut admin = open(&mut session, 1);
        join(&mut session, 1, Role::Admin, None);
        drain(&mut admin);

        session.handle_packet(1, ClientPacket::Command { payload: json!({"fx": 1}) });
        assert!(errors(&drain(&mut admin)).is_empty());
    }

    #[test]
    fn test_toggle_requires_playing() {
        let mut session = test_session(30);
        let mut rx = open(&mut session, 1);
        let _admin = open(&mut session, 2);
        join(&mut session, 1, Role::Player, None);
        drain(&mut rx);

        session.handle_packet(1, ClientPacket::Toggle { x: 0, y: 0 });
        assert!(drain(&mut rx).is_empty());
        assert!(session.registry().find(1).unwrap().selected.is_empty());

        start_playing(&mut session, 2);
        drain(&mut rx);
        session.handle_packet(1, ClientPacket::Toggle { x: 0, y: 0 });
        assert_eq!(drain(&mut rx), vec![ServerPacket::Add { x: 0, y: 0, score: 0 }]);
        session.handle_packet(1, ClientPacket::Toggle { x: 0, y: 0 });
        assert_eq!(drain(&mut rx), vec![ServerPacket::Remove { x: 0, y: 0, score: 0 }]);
    }

    #[test]
    fn test_toggle_out_of_bounds_ignored() {
        let mut session = test_session(30);
        let mut rx = open(&mut session, 1);
        let _admin = open(&mut session, 2);
        join(&mut session, 1, Role::Player, None);
        start_playing(&mut session, 2);
        drain(&mut rx);

        session.handle_packet(1, ClientPacket::Toggle { x: CARD_WIDTH as u8, y: 0 });
        session.handle_packet(1, ClientPacket::Toggle { x: 0, y: 200 });
        assert!(drain(&mut rx).is_empty());
        assert!(session.registry().find(1).unwrap().selected.is_empty());
    }

    #[test]
    fn test_toggle_from_unknown_connection_is_silent() {
        let mut session = test_session(30);
        let mut rx = open(&mut session, 1);
        let _admin = open(&mut session, 2);
        start_playing(&mut session, 2);
        drain(&mut rx);

        session.handle_packet(1, ClientPacket::Toggle { x: 0, y: 0 });
        session.handle_packet(1, ClientPacket::Rejoin { keep_same_card: false });
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_rejoin_new_card() {
        let mut session = test_session(30);
        let mut rx = open(&mut session, 1);
        join(&mut session, 1, Role::Player, None);
        let old = session.registry().find(1).unwrap().card.id;
        drain(&mut rx);

        session.handle_packet(1, ClientPacket::Rejoin { keep_same_card: false });
        let packets = drain(&mut rx);
        match &packets[0] {
            ServerPacket::Rejoined { name, card } => {
                assert_eq!(name, "p1");
                assert_ne!(card.id, old);
            }
            other => panic!("Unexpected packet {:?}", other),
        }
        assert!(session.pool().contains(old));
        assert_eq!(session.pool().len(), 23);
    }

    #[test]
    fn test_rejoin_with_exhausted_pool_keeps_card() {
        let catalog = Arc::new(Catalog::parse(
            "1,_,2,_,10,_,20,_,23,_,30,_,40,_,46,_,56,_,64,_,68,76,79,_,_,82,87",
        )
        .unwrap());
        let pool = CardPool::with_rng(catalog, StdRng::seed_from_u64(1));
        let mut session = Session::new(pool, &SessionConfig::default());
        let mut rx = open(&mut session, 1);
        join(&mut session, 1, Role::Player, None);
        drain(&mut rx);

        session.handle_packet(1, ClientPacket::Rejoin { keep_same_card: false });
        let packets = drain(&mut rx);
        assert_eq!(errors(&packets), vec!["Game is full"]);
        assert!(packets.iter().any(|packet| matches!(
            packet,
            ServerPacket::Rejoined { card, .. } if card.id == 0
        )));
    }

    #[test]
    fn test_disconnect_without_secret_releases_card() {
        let mut session = test_session(30);
        let _rx = open(&mut session, 1);
        join(&mut session, 1, Role::Player, None);
        assert_eq!(session.pool().len(), 23);

        session.handle_message(ServerMessage::Disconnected {
            client_id: 1,
            reason: "transport close".to_string(),
        });
        assert!(session.registry().is_empty());
        assert_eq!(session.pool().len(), 24);
        assert_eq!(session.connections(), 0);

        // Idempotent.
        session.disconnect(1, "again");
        assert_eq!(session.pool().len(), 24);
    }

    #[test]
    fn test_disconnect_clears_singletons() {
        let mut session = test_session(30);
        let _a = open(&mut session, 1);
        let _d = open(&mut session, 2);
        join(&mut session, 1, Role::Admin, None);
        join(&mut session, 2, Role::Display, None);

        session.disconnect(1, "bye");
        session.disconnect(2, "bye");
        assert_eq!(session.game().admin(), None);
        assert_eq!(session.game().display(), None);
    }

    #[test]
    fn test_reconnect_after_drop_preserves_progress() {
        let mut session = test_session(30);
        let _admin = open(&mut session, 9);
        let _rx = open(&mut session, 1);
        join(&mut session, 1, Role::Player, Some("secret"));
        start_playing(&mut session, 9);
        session.handle_packet(1, ClientPacket::Toggle { x: 0, y: 0 });
        let before = session.registry().find(1).unwrap().clone();

        session.disconnect(1, "network drop");
        assert!(session.registry().find(1).is_none());
        assert!(!session.pool().contains(before.card.id));

        let mut rx = open(&mut session, 2);
        join(&mut session, 2, Role::Player, Some("secret"));
        let packets = drain(&mut rx);
        assert_eq!(
            packets[0],
            ServerPacket::Init {
                phase: Phase::Playing,
                name: before.name.clone(),
                card: before.card.clone(),
            }
        );
        assert_eq!(packets[1], ServerPacket::Add { x: 0, y: 0, score: 0 });

        let after = session.registry().find(2).unwrap();
        assert_eq!(after.card, before.card);
        assert_eq!(after.selected, before.selected);
        assert_eq!(after.score, before.score);
        assert_eq!(session.pool().len(), 23);
    }

    #[test]
    fn test_reconnect_over_live_connection_closes_it() {
        let mut session = test_session(30);
        let mut old = open(&mut session, 1);
        join(&mut session, 1, Role::Player, Some("secret"));
        drain(&mut old);

        let _new = open(&mut session, 2);
        join(&mut session, 2, Role::Player, Some("secret"));

        assert!(session.registry().find(1).is_none());
        assert!(session.registry().find(2).is_some());
        assert_eq!(session.connections(), 1);
        drain(&mut old);
        assert!(matches!(
            old.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));

        // The stale socket's own disconnect later changes nothing.
        session.disconnect(1, "stale");
        assert!(session.registry().find(2).is_some());
        assert_eq!(session.pool().len(), 23);
    }

    #[test]
    fn test_detached_player_expires() {
        let mut session = test_session(30);
        let _rx = open(&mut session, 1);
        join(&mut session, 1, Role::Player, Some("secret"));
        session.disconnect(1, "drop");
        assert_eq!(session.pool().len(), 23);

        session.tick(Instant::now());
        assert_eq!(session.pool().len(), 23);

        session.tick(Instant::now() + Duration::from_secs(31));
        assert_eq!(session.pool().len(), 24);
        assert!(session.registry().detached_players().is_empty());

        // The secret is forgotten, so the same token now makes a fresh join.
        let mut rx = open(&mut session, 2);
        join(&mut session, 2, Role::Player, Some("secret"));
        assert!(matches!(drain(&mut rx)[0], ServerPacket::Init { .. }));
        assert_eq!(session.pool().len(), 23);
    }

    #[test]
    fn test_zero_grace_releases_immediately() {
        let mut session = test_session(0);
        let _rx = open(&mut session, 1);
        join(&mut session, 1, Role::Player, Some("secret"));
        session.disconnect(1, "drop");

        assert_eq!(session.pool().len(), 24);
        assert!(session.registry().detached_players().is_empty());
    }

    #[test]
    fn test_rejected_frame_reported_to_sender() {
        let mut session = test_session(30);
        let mut rx = open(&mut session, 1);
        session.handle_message(ServerMessage::Rejected {
            client_id: 1,
            reason: "Malformed message".to_string(),
        });
        assert_eq!(errors(&drain(&mut rx)), vec!["Malformed message"]);
    }

    #[test]
    fn test_silent_connections_time_out() {
        let mut session = test_session(30);
        let _admin = open(&mut session, 1);
        let _player = open(&mut session, 2);
        let _anonymous = open(&mut session, 3);
        join(&mut session, 1, Role::Admin, None);
        join(&mut session, 2, Role::Player, Some("secret"));
        join(&mut session, 3, Role::Player, None);
        let held = session.registry().find(2).unwrap().card.id;
        let released = session.registry().find(3).unwrap().card.id;

        session.handle_message(ServerMessage::Heartbeat { client_id: 2 });
        session.tick(Instant::now());
        assert_eq!(session.connections(), 3);

        session.tick(Instant::now() + Duration::from_secs(21));
        assert_eq!(session.connections(), 0);
        assert_eq!(session.game().admin(), None);
        assert!(session.registry().is_empty());

        // The player with a secret is held for reconnection, the other
        // player's card goes straight back.
        assert_eq!(session.registry().detached_players().len(), 1);
        assert!(!session.pool().contains(held));
        assert!(session.pool().contains(released));

        // Freed slots admit new connections again.
        let mut rx = open(&mut session, 4);
        join(&mut session, 4, Role::Player, Some("secret"));
        assert!(matches!(
            drain(&mut rx)[0],
            ServerPacket::Init { ref card, .. } if card.id == held
        ));
    }

    #[test]
    fn test_zero_client_timeout_keeps_connections() {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let config = SessionConfig {
            client_timeout: Duration::ZERO,
            ..SessionConfig::default()
        };
        let mut session = Session::new(CardPool::new(catalog), &config);
        let _rx = open(&mut session, 1);

        session.tick(Instant::now() + Duration::from_secs(3600));
        assert_eq!(session.connections(), 1);
    }

    #[test]
    fn test_admin_join_ignores_player_secret() {
        let mut session = test_session(30);
        let mut player = open(&mut session, 1);
        let _admin = open(&mut session, 2);
        join(&mut session, 1, Role::Player, Some("s"));
        drain(&mut player);

        join(&mut session, 2, Role::Admin, Some("s"));

        assert_eq!(session.game().admin(), Some(2));
        assert!(session.registry().find(1).is_some());
        assert!(session.registry().find(2).is_none());
        assert_eq!(session.connections(), 2);
        assert!(errors(&drain(&mut player)).is_empty());
    }
}
