use std::collections::HashMap;

use crate::name::PeerId;
use crate::piece::PieceSet;

use super::error::SwarmError;

/// An in-flight piece request.
///
/// The entry's existence implies exactly one armed retransmission timer for
/// the piece; removing the entry is what cancels the timer.
#[derive(Debug, Clone)]
pub struct OutstandingRequest {
    pub piece: u32,
    /// The neighbor whose advertisement triggered the request.
    pub target: PeerId,
    /// That neighbor's possession vector, kept so the next candidate can be
    /// picked immediately when the response arrives.
    pub snapshot: PieceSet,
    retransmissions: u8,
}

impl OutstandingRequest {
    /// Retransmissions performed so far.
    pub fn retransmissions(&self) -> u8 {
        self.retransmissions
    }
}

/// What to do after a retransmission timer fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Send the request again; `attempt` counts this retransmission,
    /// starting at 1.
    Retransmit { attempt: u8 },
    /// Retry budget exhausted; the entry has been removed and the caller
    /// should fall back to discovery.
    GiveUp { target: PeerId },
    /// No entry for the piece; the fire was stale.
    Stale,
}

/// Tracks in-flight piece requests, at most one per piece id.
#[derive(Debug)]
pub struct OutstandingRequestTable {
    entries: HashMap<u32, OutstandingRequest>,
    max_retransmissions: u8,
}

impl OutstandingRequestTable {
    pub fn new(max_retransmissions: u8) -> Self {
        Self {
            entries: HashMap::new(),
            max_retransmissions,
        }
    }

    /// Registers a new in-flight request. Rejects a piece that already has
    /// one, which is what enforces the at-most-one invariant.
    pub fn add(&mut self, piece: u32, target: PeerId, snapshot: PieceSet) -> Result<(), SwarmError> {
        if self.entries.contains_key(&piece) {
            return Err(SwarmError::DuplicateRequest(piece));
        }
        self.entries.insert(
            piece,
            OutstandingRequest {
                piece,
                target,
                snapshot,
                retransmissions: 0,
            },
        );
        Ok(())
    }

    /// Applies the retry policy after a timer fire.
    pub fn on_timeout(&mut self, piece: u32) -> RetryDecision {
        let Some(entry) = self.entries.get_mut(&piece) else {
            return RetryDecision::Stale;
        };
        if entry.retransmissions < self.max_retransmissions {
            entry.retransmissions += 1;
            return RetryDecision::Retransmit {
                attempt: entry.retransmissions,
            };
        }
        let target = entry.target;
        self.entries.remove(&piece);
        RetryDecision::GiveUp { target }
    }

    /// Resolves a request when its response arrives, returning the stored
    /// entry so the caller can pipeline the next request to the same
    /// neighbor.
    pub fn on_response(&mut self, piece: u32) -> Option<OutstandingRequest> {
        self.entries.remove(&piece)
    }

    pub fn is_outstanding(&self, piece: u32) -> bool {
        self.entries.contains_key(&piece)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry, returning the piece ids so their timers can be
    /// disarmed.
    pub fn clear(&mut self) -> Vec<u32> {
        let pieces = self.entries.keys().copied().collect();
        self.entries.clear();
        pieces
    }
}
