//! Piece possession and payload storage.
//!
//! A swarm's content is split into pieces identified by dense integer ids.
//! [`PieceSet`] tracks which pieces a peer holds and serializes that vector
//! for advertisements; [`PieceStore`] is the boundary to wherever payloads
//! actually live, with [`MemoryStore`] as the in-memory implementation.

mod error;
mod set;
mod store;

pub use error::PieceError;
pub use set::PieceSet;
pub use store::{MemoryStore, PieceStore};

#[cfg(test)]
mod tests;
