//! Wire vocabulary shared by the session server and its tooling.
//!
//! Every message crossing a connection boundary is one of the closed enums
//! below, encoded as a JSON object tagged by `type`. Anything that does not
//! decode into [`ClientPacket`] is rejected before it reaches the coordinator.

use serde::{Deserialize, Serialize};

pub const CARD_WIDTH: usize = 9;
pub const CARD_HEIGHT: usize = 3;
pub const MAX_NUMBER: u8 = 90;
/// Three winning tiers: first row, second row, full card.
pub const MAX_SCORE: u8 = 3;

/// Volatile per-connection identifier. Changes across reconnects.
pub type ConnectionId = u32;
/// Index into the card catalog.
pub type CardId = u32;

/// One row of a card. `None` marks an empty cell.
pub type Row = [Option<u8>; CARD_WIDTH];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Selecting,
    Playing,
    GameOver,
}

impl Phase {
    /// The single cyclic transition: Selecting -> Playing -> GameOver -> Selecting.
    pub fn next(self) -> Self {
        match self {
            Phase::Selecting => Phase::Playing,
            Phase::Playing => Phase::GameOver,
            Phase::GameOver => Phase::Selecting,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Player,
    Admin,
    #[serde(alias = "web")]
    Display,
}

/// A cell position on a card, `x` is the column and `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: u8,
    pub y: u8,
}

impl Coord {
    pub fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    pub fn in_bounds(&self) -> bool {
        (self.x as usize) < CARD_WIDTH && (self.y as usize) < CARD_HEIGHT
    }
}

/// An immutable card as issued to a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: CardId,
    /// Human facing number, `id + 1`.
    pub card_no: u32,
    /// Background asset reference rendered behind the card.
    pub video: String,
    pub content: [Row; CARD_HEIGHT],
    /// Non-empty cell values in catalog order.
    pub numbers: Vec<u8>,
}

impl Card {
    pub fn cell(&self, coord: Coord) -> Option<u8> {
        if !coord.in_bounds() {
            return None;
        }
        self.content[coord.y as usize][coord.x as usize]
    }
}

/// Messages a client may send. Transport disconnects are not part of this
/// vocabulary; the network layer reports them separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientPacket {
    Join {
        #[serde(default)]
        name: Option<String>,
        role: Role,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        secret: Option<String>,
    },
    Toggle {
        x: u8,
        y: u8,
    },
    Rejoin {
        #[serde(rename = "keepSameCard")]
        keep_same_card: bool,
    },
    Command {
        payload: serde_json::Value,
    },
    AdvancePhase,
}

/// Messages the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerPacket {
    Init {
        phase: Phase,
        name: String,
        card: Card,
    },
    Rejoined {
        name: String,
        card: Card,
    },
    Add {
        x: u8,
        y: u8,
        score: u8,
    },
    Remove {
        x: u8,
        y: u8,
        score: u8,
    },
    Update(Snapshot),
    Screen {
        payload: serde_json::Value,
    },
    Error {
        message: String,
    },
}

/// Full-state snapshot. Players and the admin receive different shapes
/// under the same `update` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Snapshot {
    Admin(AdminView),
    Player(PlayerView),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub phase: Phase,
    pub players: Vec<PlayerSummary>,
}

/// Another player's public line in a [`PlayerView`]. `card` is only set on
/// the receiver's own entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub id: ConnectionId,
    pub name: String,
    pub score: u8,
    pub card: Option<Card>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminView {
    pub phase: Phase,
    pub players: Vec<PlayerRecord>,
    /// Players whose connection dropped and who may still reclaim their card.
    pub detached: Vec<PlayerRecord>,
    pub admin: Option<ConnectionId>,
    pub display: Option<ConnectionId>,
    pub available_cards: Vec<CardId>,
    pub connections: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: ConnectionId,
    pub name: String,
    pub score: u8,
    pub card: Card,
    pub selected: Vec<Coord>,
}
