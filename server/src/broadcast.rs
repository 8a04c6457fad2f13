//! Full-state fan-out.
//!
//! Every broadcast re-sends the complete current truth: each player gets a
//! private view in which only its own card is visible, and the admin gets
//! the raw session. There is no diffing, clients re-render idempotently.

use crate::card_pool::CardPool;
use crate::client_manager::ClientManager;
use crate::game::GameState;
use crate::registry::{Player, PlayerRegistry};
use bingo_shared::{
    AdminView, ConnectionId, Phase, PlayerRecord, PlayerSummary, PlayerView, ServerPacket,
    Snapshot,
};
use log::debug;

/// The roster as seen by `viewer`. Other players' cards are always omitted.
pub fn player_view(phase: Phase, players: &[Player], viewer: ConnectionId) -> PlayerView {
    PlayerView {
        phase,
        players: players
            .iter()
            .map(|player| PlayerSummary {
                id: player.id,
                name: player.name.clone(),
                score: player.score,
                card: (player.id == viewer).then(|| player.card.clone()),
            })
            .collect(),
    }
}

pub fn admin_view(
    game: &GameState,
    registry: &PlayerRegistry,
    pool: &CardPool,
    connections: usize,
) -> AdminView {
    AdminView {
        phase: game.phase(),
        players: registry.players().iter().map(record).collect(),
        detached: registry.detached_players().into_iter().map(record).collect(),
        admin: game.admin(),
        display: game.display(),
        available_cards: pool.available(),
        connections,
    }
}

/// Sends every audience its snapshot. Reads only; callers hold the single
/// owner of the state, so no snapshot ever sees a half-applied event.
pub fn fan_out(
    clients: &ClientManager,
    game: &GameState,
    registry: &PlayerRegistry,
    pool: &CardPool,
) {
    let phase = game.phase();
    for player in registry.players() {
        let view = player_view(phase, registry.players(), player.id);
        clients.send(player.id, ServerPacket::Update(Snapshot::Player(view)));
    }

    if let Some(admin) = game.admin() {
        let view = admin_view(game, registry, pool, clients.len());
        clients.send(admin, ServerPacket::Update(Snapshot::Admin(view)));
    }

    debug!(
        "Broadcast {:?} to {} players{}",
        phase,
        registry.len(),
        if game.admin().is_some() { " and admin" } else { "" }
    );
}

fn record(player: &Player) -> PlayerRecord {
    PlayerRecord {
        id: player.id,
        name: player.name.clone(),
        score: player.score,
        card: player.card.clone(),
        selected: player.selected.iter().copied().collect(),
    }
}
