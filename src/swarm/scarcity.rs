use std::collections::BTreeMap;

use crate::piece::PieceSet;

/// Rarest-first accounting over the pieces this peer still misses.
///
/// Each missing piece starts with a counter of 1. Every neighbor
/// advertisement that also lacks the piece raises the counter by one, so a
/// higher counter means the piece was missing from more of the neighbors
/// observed so far. Entries disappear as pieces are acquired; counters are
/// never decremented.
#[derive(Debug)]
pub struct ScarcityTracker {
    counters: BTreeMap<u32, u32>,
}

impl ScarcityTracker {
    /// Seeds one entry per missing piece, each with counter 1.
    pub fn new(missing: impl IntoIterator<Item = u32>) -> Self {
        Self {
            counters: missing.into_iter().map(|piece| (piece, 1)).collect(),
        }
    }

    /// Folds a neighbor's advertisement into the counters: every tracked
    /// piece the neighbor also lacks becomes one step rarer.
    pub fn observe(&mut self, neighbor: &PieceSet) {
        for (&piece, counter) in self.counters.iter_mut() {
            if !neighbor.has(piece) {
                *counter += 1;
            }
        }
    }

    /// Drops the entry for an acquired piece.
    pub fn remove(&mut self, piece: u32) {
        self.counters.remove(&piece);
    }

    /// Picks the rarest piece the neighbor can actually provide, skipping
    /// pieces for which `exclude` returns true (already-outstanding
    /// requests). Ties go to the lowest piece id.
    pub fn select_candidate(
        &self,
        neighbor: &PieceSet,
        exclude: impl Fn(u32) -> bool,
    ) -> Option<u32> {
        let mut best: Option<(u32, u32)> = None;
        for (&piece, &counter) in self.counters.iter() {
            if !neighbor.has(piece) || exclude(piece) {
                continue;
            }
            // iteration is ascending by id, so a strict comparison keeps
            // the lowest id among equal counters
            match best {
                Some((_, best_counter)) if counter <= best_counter => {}
                _ => best = Some((piece, counter)),
            }
        }
        best.map(|(piece, _)| piece)
    }

    /// Current counter for a piece, if still tracked.
    pub fn counter(&self, piece: u32) -> Option<u32> {
        self.counters.get(&piece).copied()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}
