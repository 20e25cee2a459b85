use thiserror::Error;

/// Errors that can occur while handling piece bitmaps.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PieceError {
    /// A received bitmap's length does not match the swarm's piece count.
    #[error("bitmap length {actual} does not match piece count {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    /// A received bitmap contained a byte other than 0 or 1.
    #[error("invalid bitmap symbol {0:#04x}")]
    InvalidSymbol(u8),
}
