//! Player identity, card ownership and reconnection secrets.

use crate::card_pool::CardPool;
use crate::error::SessionError;
use crate::scoring;
use bingo_shared::{Card, CardId, ConnectionId, Coord};
use log::info;
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

/// A participant holding one card. Keyed by its current connection id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: ConnectionId,
    pub name: String,
    pub card: Card,
    pub selected: BTreeSet<Coord>,
    pub score: u8,
    pub secret: Option<String>,
}

impl Player {
    pub fn new(id: ConnectionId, name: String, card: Card, secret: Option<String>) -> Self {
        Self {
            id,
            name,
            card,
            selected: BTreeSet::new(),
            score: 0,
            secret,
        }
    }

    /// Flips a cell and rescores. Returns true if the cell is now selected.
    pub fn toggle(&mut self, coord: Coord) -> bool {
        let selected = if self.selected.remove(&coord) {
            false
        } else {
            self.selected.insert(coord);
            true
        };
        self.score = scoring::score(&self.card, &self.selected);
        selected
    }

    fn reset_round(&mut self) {
        self.selected.clear();
        self.score = 0;
    }
}

/// Outcome of a between-rounds card request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reassignment {
    /// The player asked to keep its card.
    Kept,
    /// The player received a different card.
    Swapped,
    /// A new card was requested but the pool is empty; the old one stays.
    Exhausted,
}

#[derive(Debug)]
struct Detached {
    player: Player,
    since: Instant,
}

/// Owns every player, active or waiting to reconnect.
///
/// Active players form the roster in join order. A detached player keeps its
/// card reserved and stays reachable through its secret until it either
/// rebinds to a new connection or expires.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: Vec<Player>,
    detached: HashMap<ConnectionId, Detached>,
    secrets: HashMap<String, ConnectionId>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh player and, if given, maps its secret to `id`.
    ///
    /// Fails if `id` already names an active or detached player. Connection
    /// ids wrap, so a long-lived detached record can collide with a new one.
    pub fn create(
        &mut self,
        id: ConnectionId,
        name: String,
        card: Card,
        secret: Option<String>,
    ) -> Result<&Player, SessionError> {
        if self.find(id).is_some() || self.detached.contains_key(&id) {
            return Err(SessionError::DuplicateConnection(id));
        }

        if let Some(secret) = &secret {
            self.secrets.insert(secret.clone(), id);
        }
        info!("Player {} ({}) holds card {}", id, name, card.card_no);
        self.players.push(Player::new(id, name, card, secret));
        Ok(&self.players[self.players.len() - 1])
    }

    /// Looks up an active player by its current connection.
    ///
    /// Detached players are not found here; they are reachable only
    /// through their secret until they rebind.
    pub fn find(&self, id: ConnectionId) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    /// Mutable counterpart of [`find`](Self::find), used to apply toggles.
    pub fn find_mut(&mut self, id: ConnectionId) -> Option<&mut Player> {
        self.players.iter_mut().find(|player| player.id == id)
    }

    /// Looks up the connection a secret currently points at.
    pub fn resolve_secret(&self, secret: &str) -> Option<ConnectionId> {
        self.secrets.get(secret).copied()
    }

    /// Moves a player, active or detached, from `old` to `new`. Card,
    /// selections and score are untouched; the secret follows the player.
    pub fn rebind(&mut self, old: ConnectionId, new: ConnectionId) -> Option<&Player> {
        let index = match self.players.iter().position(|player| player.id == old) {
            Some(index) => index,
            None => {
                let detached = self.detached.remove(&old)?;
                self.players.push(detached.player);
                self.players.len() - 1
            }
        };

        let player = &mut self.players[index];
        player.id = new;
        if let Some(secret) = &player.secret {
            self.secrets.insert(secret.clone(), new);
        }
        info!("Player {} rebound from connection {} to {}", player.name, old, new);
        Some(&self.players[index])
    }

    /// Detaches and returns an active player. The caller releases its card.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Player> {
        let index = self.players.iter().position(|player| player.id == id)?;
        let player = self.players.remove(index);
        self.forget_secret(&player);
        Some(player)
    }

    /// Takes an active player off the roster but keeps its record, and
    /// card, for a later [`rebind`](Self::rebind). Returns false if `id`
    /// is not an active player.
    pub fn detach(&mut self, id: ConnectionId, now: Instant) -> bool {
        let Some(index) = self.players.iter().position(|player| player.id == id) else {
            return false;
        };
        let player = self.players.remove(index);
        self.detached.insert(id, Detached { player, since: now });
        true
    }

    /// Drops detached players older than `grace` and returns them so their
    /// cards can go back to the pool.
    pub fn expire_detached(&mut self, grace: Duration, now: Instant) -> Vec<Player> {
        let expired: Vec<ConnectionId> = self
            .detached
            .iter()
            .filter(|(_, detached)| now.saturating_duration_since(detached.since) >= grace)
            .map(|(id, _)| *id)
            .collect();

        let mut players = Vec::with_capacity(expired.len());
        for id in expired {
            if let Some(detached) = self.detached.remove(&id) {
                self.forget_secret(&detached.player);
                players.push(detached.player);
            }
        }
        players.sort_by_key(|player| player.id);
        players
    }

    /// Starts a new round for a player: selections and score reset, and
    /// unless `keep_same_card` is set the card is swapped for a fresh draw.
    /// Returns `None` for an unknown connection.
    pub fn reassign_card(
        &mut self,
        id: ConnectionId,
        keep_same_card: bool,
        pool: &mut CardPool,
    ) -> Option<Reassignment> {
        let player = self.find_mut(id)?;

        let outcome = if keep_same_card {
            Reassignment::Kept
        } else {
            match pool.draw() {
                Some(card) => {
                    let old = std::mem::replace(&mut player.card, card);
                    pool.release(old.id);
                    Reassignment::Swapped
                }
                None => Reassignment::Exhausted,
            }
        };

        player.reset_round();
        Some(outcome)
    }

    /// The active roster in join order.
    ///
    /// Reconnected players move to the end. This is the order every
    /// snapshot lists players in.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Detached players ordered by their last connection id.
    pub fn detached_players(&self) -> Vec<&Player> {
        let mut players: Vec<&Player> = self.detached.values().map(|d| &d.player).collect();
        players.sort_by_key(|player| player.id);
        players
    }

    /// Ids of every card held by an active or detached player.
    pub fn held_cards(&self) -> Vec<CardId> {
        self.players
            .iter()
            .chain(self.detached.values().map(|d| &d.player))
            .map(|player| player.card.id)
            .collect()
    }

    /// Number of active players. Detached players are not counted.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    fn forget_secret(&mut self, player: &Player) {
        if let Some(secret) = &player.secret {
            if self.secrets.get(secret) == Some(&player.id) {
                self.secrets.remove(secret);
            }
        }
    }
}
