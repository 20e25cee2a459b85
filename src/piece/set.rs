use bytes::{BufMut, Bytes, BytesMut};

use super::error::PieceError;

/// A peer's possession vector over all pieces of a swarm.
///
/// Bits only ever flip from missing to held; nothing in the API unsets a
/// bit. The wire form used in advertisements is one byte per piece (0 or 1)
/// in ascending piece id order, which keeps decoding trivially
/// length-checked at the cost of eight times the bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceSet {
    bits: Vec<u8>,
    piece_count: u32,
}

impl PieceSet {
    /// Creates a possession vector with no pieces held.
    pub fn empty(piece_count: u32) -> Self {
        let byte_count = (piece_count as usize).div_ceil(8);
        Self {
            bits: vec![0; byte_count],
            piece_count,
        }
    }

    /// Creates a possession vector with every piece held (the producer's
    /// starting state).
    pub fn full(piece_count: u32) -> Self {
        let byte_count = (piece_count as usize).div_ceil(8);
        let mut set = Self {
            bits: vec![0xFF; byte_count],
            piece_count,
        };
        set.clear_spare_bits();
        set
    }

    /// Returns true if the piece is held.
    pub fn has(&self, piece: u32) -> bool {
        if piece >= self.piece_count {
            return false;
        }
        let byte_index = (piece / 8) as usize;
        let bit_index = 7 - (piece % 8);
        (self.bits[byte_index] >> bit_index) & 1 == 1
    }

    /// Marks a piece as held. A no-op if it already is, or if the id is out
    /// of range.
    pub fn mark_acquired(&mut self, piece: u32) {
        if piece >= self.piece_count {
            return;
        }
        let byte_index = (piece / 8) as usize;
        let bit_index = 7 - (piece % 8);
        self.bits[byte_index] |= 1 << bit_index;
    }

    /// Total number of pieces in the swarm.
    pub fn piece_count(&self) -> u32 {
        self.piece_count
    }

    /// Number of pieces currently held.
    pub fn held(&self) -> u32 {
        self.bits.iter().map(|b| b.count_ones()).sum()
    }

    /// True iff every piece is held.
    pub fn is_complete(&self) -> bool {
        self.held() == self.piece_count
    }

    /// Ids of the pieces not yet held, in ascending order.
    pub fn missing(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.piece_count).filter(|&piece| !self.has(piece))
    }

    /// Serializes the possession vector for an advertisement: one byte per
    /// piece in ascending id order.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.piece_count as usize);
        for piece in 0..self.piece_count {
            buf.put_u8(u8::from(self.has(piece)));
        }
        buf.freeze()
    }

    /// Parses a received advertisement blob into a neighbor's possession
    /// vector. The blob must be exactly one byte per piece, each 0 or 1.
    pub fn decode(blob: &[u8], piece_count: u32) -> Result<Self, PieceError> {
        if blob.len() != piece_count as usize {
            return Err(PieceError::LengthMismatch {
                expected: piece_count as usize,
                actual: blob.len(),
            });
        }
        let mut set = Self::empty(piece_count);
        for (piece, &byte) in blob.iter().enumerate() {
            match byte {
                0 => {}
                1 => set.mark_acquired(piece as u32),
                other => return Err(PieceError::InvalidSymbol(other)),
            }
        }
        Ok(set)
    }

    /// Clears bits in the last byte that don't correspond to pieces.
    fn clear_spare_bits(&mut self) {
        let spare = self.bits.len() * 8 - self.piece_count as usize;
        if spare > 0 && !self.bits.is_empty() {
            let mask = 0xFFu8 << spare;
            let last = self.bits.len() - 1;
            self.bits[last] &= mask;
        }
    }
}
