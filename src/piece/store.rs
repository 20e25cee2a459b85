use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

/// Where piece payloads live.
///
/// The engine only needs get and put by piece id; packaging, manifests and
/// on-disk layout belong to the layer that implements this.
pub trait PieceStore: Send + Sync + 'static {
    /// Returns the payload for a piece, if held.
    fn get(&self, piece: u32) -> Option<Bytes>;

    /// Stores the payload for a piece. Ids outside the swarm are ignored.
    fn put(&self, piece: u32, payload: Bytes);

    /// Returns true if the piece's payload is held.
    fn contains(&self, piece: u32) -> bool;
}

/// In-memory payload storage, cheaply cloneable so the application can read
/// progress while the engine runs.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    pieces: Arc<RwLock<Vec<Option<Bytes>>>>,
}

impl MemoryStore {
    /// Creates an empty store with room for `piece_count` payloads.
    pub fn empty(piece_count: u32) -> Self {
        Self {
            pieces: Arc::new(RwLock::new(vec![None; piece_count as usize])),
        }
    }

    /// Creates a store pre-filled with the producer's payloads, one per
    /// piece in ascending id order.
    pub fn seeded(payloads: Vec<Bytes>) -> Self {
        Self {
            pieces: Arc::new(RwLock::new(payloads.into_iter().map(Some).collect())),
        }
    }

    /// Number of payloads currently held.
    pub fn held(&self) -> usize {
        self.pieces.read().iter().filter(|p| p.is_some()).count()
    }

    /// Room for payloads, equal to the swarm's piece count.
    pub fn capacity(&self) -> usize {
        self.pieces.read().len()
    }
}

impl PieceStore for MemoryStore {
    fn get(&self, piece: u32) -> Option<Bytes> {
        self.pieces.read().get(piece as usize)?.clone()
    }

    fn put(&self, piece: u32, payload: Bytes) {
        if let Some(slot) = self.pieces.write().get_mut(piece as usize) {
            *slot = Some(payload);
        }
    }

    fn contains(&self, piece: u32) -> bool {
        matches!(self.pieces.read().get(piece as usize), Some(Some(_)))
    }
}
