use thiserror::Error;

/// Errors surfaced by the swarm engine's components.
///
/// None of these are fatal: the engine absorbs them, logs, and keeps
/// operating. They exist so component boundaries stay explicit and
/// testable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SwarmError {
    /// A request for this piece is already in flight.
    #[error("request for piece {0} already outstanding")]
    DuplicateRequest(u32),

    /// A name failed to parse or classify.
    #[error("name error: {0}")]
    Name(#[from] crate::name::NameError),

    /// A bitmap failed to decode.
    #[error("bitmap error: {0}")]
    Piece(#[from] crate::piece::PieceError),
}
