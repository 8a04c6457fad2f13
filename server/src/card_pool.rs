//! Availability tracking for the finite card catalog.
//!
//! Every card id is, at every instant, either in the pool or held by exactly
//! one player. The pool never hands out an id twice without a release in
//! between.

use crate::catalog::Catalog;
use bingo_shared::{Card, CardId};
use log::warn;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

pub struct CardPool {
    catalog: Arc<Catalog>,
    available: Vec<CardId>,
    rng: StdRng,
}

impl CardPool {
    /// Creates a pool holding every card in the catalog.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_rng(catalog, StdRng::from_entropy())
    }

    /// Creates a pool whose draws follow the given generator, for
    /// reproducible sessions.
    pub fn with_rng(catalog: Arc<Catalog>, rng: StdRng) -> Self {
        let available = catalog.ids().collect();
        Self {
            catalog,
            available,
            rng,
        }
    }

    /// Removes a uniformly random card from the pool.
    ///
    /// Returns `None` when the pool is exhausted; callers treat that as
    /// a full game rather than a failure.
    pub fn draw(&mut self) -> Option<Card> {
        if self.available.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.available.len());
        let id = self.available.swap_remove(index);
        self.catalog.get(id).cloned()
    }

    /// Puts a card back. A duplicate or unknown id is logged and ignored.
    pub fn release(&mut self, id: CardId) {
        if self.catalog.get(id).is_none() {
            warn!("Ignoring release of unknown card {}", id);
            return;
        }
        if self.available.contains(&id) {
            warn!("Card {} released twice, pool left unchanged", id);
            return;
        }
        self.available.push(id);
    }

    /// Checks whether a card is free to draw.
    ///
    /// A held card, whether its player is connected or detached, is never
    /// contained.
    pub fn contains(&self, id: CardId) -> bool {
        self.available.contains(&id)
    }

    /// Available ids in ascending order.
    pub fn available(&self) -> Vec<CardId> {
        let mut ids = self.available.clone();
        ids.sort_unstable();
        ids
    }

    /// Number of cards still available to new players.
    pub fn len(&self) -> usize {
        self.available.len()
    }

    /// Checks whether the next fresh join will be refused as a full game.
    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }
}
