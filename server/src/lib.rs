//! # Bingo Session Server Library
//!
//! This library provides the authoritative server for a live bingo session:
//! many mobile players mark numbers on their own cards, one admin client
//! advances the game and calls numbers, and one display client renders the
//! effects the admin triggers. The server holds the only copy of the truth
//! and keeps every connected role consistent with it.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Game State
//! The global phase (`Selecting -> Playing -> GameOver -> Selecting ...`),
//! card ownership and every player's selections and score live here. Clients
//! never compute scores; they render what the server sends.
//!
//! ### Identity and Reconnection
//! Players carry a client-generated secret. A player whose connection drops
//! keeps its card reserved for a grace period and resumes with the same
//! name, card, selections and score when it rejoins with that secret.
//!
//! ### State Broadcasting
//! On a fixed cadence, and right after phase changes or card swaps, every
//! player receives a private snapshot (its own card only) and the admin
//! receives the full session.
//!
//! ## Architecture Design
//!
//! ### Single Owner Event Loop
//! All session state is owned by one [`session::Session`]. Transport tasks
//! forward events over one ordered queue and the loop applies each event in
//! full before the next, interleaved with broadcast ticks. No handler blocks
//! and every send is fire-and-forget.
//!
//! ### WebSocket Transport
//! Each connection runs a reader that decodes JSON frames into the closed
//! [`bingo_shared::ClientPacket`] vocabulary and a writer that drains an
//! outbound queue. Frames that fail to decode never reach the session.
//!
//! ## Module Organization
//!
//! - `catalog`: the static card set and its text format
//! - `card_pool`: which cards are free, with uniform random draws
//! - `registry`: players, their cards and selections, reconnection secrets
//! - `scoring`: completed rows on a card
//! - `game`: the phase cycle and the admin and display singletons
//! - `client_manager`: admission capacity and outbound routing
//! - `session`: the coordinator applying every event
//! - `broadcast`: per-audience snapshots
//! - `network`: sockets, handshakes and the main loop
//! - `config`: command line flags
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use bingo_server::card_pool::CardPool;
//! use bingo_server::catalog::Catalog;
//! use bingo_server::network::Server;
//! use bingo_server::session::{Session, SessionConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = Arc::new(Catalog::builtin()?);
//!     let session = Session::new(CardPool::new(catalog), &SessionConfig::default());
//!
//!     // One full-state broadcast per second
//!     let mut server = Server::new("0.0.0.0:4000", session, Duration::from_secs(1)).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod card_pool;
pub mod catalog;
pub mod client_manager;
pub mod config;
pub mod error;
pub mod game;
pub mod network;
pub mod registry;
pub mod scoring;
pub mod session;
