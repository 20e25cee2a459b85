//! Content naming and message classification.
//!
//! Every message on the wire is addressed by a hierarchical name. The first
//! path component distinguishes the message kinds the engine understands:
//!
//! - `/beacon/<peer>/<seq>` — discovery beacon
//! - `/bitmap/<swarm-prefix>/<peer>/<blob>/<seq>` — possession advertisement,
//!   with the encoded bitmap appended as a name component
//! - `/<swarm-prefix>/<piece>` — piece request/response
//! - `/<swarm-prefix>/listing` — producer-only content listing
//!
//! [`Classifier`] owns the swarm prefix and turns raw names into parsed
//! [`Classified`] values; anything else is rejected with
//! [`NameError::UnknownKind`] and ignored upstream.

use std::fmt;

use bytes::Bytes;
use sha2::{Digest, Sha256};
use thiserror::Error;

const KIND_BEACON: &[u8] = b"beacon";
const KIND_BITMAP: &[u8] = b"bitmap";
const KIND_LISTING: &[u8] = b"listing";
const PEER_PREFIX: &str = "node-";

/// Errors produced while parsing or classifying names.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    /// The name does not match any message kind this swarm understands.
    #[error("unknown message kind")]
    UnknownKind,

    /// The name carried a known kind marker but the wrong shape.
    #[error("malformed name: {0}")]
    Malformed(&'static str),

    /// A peer component did not parse as `node-<id>`.
    #[error("invalid peer component")]
    InvalidPeer,

    /// A numeric component did not parse.
    #[error("invalid numeric component")]
    InvalidNumber,
}

/// One opaque component of a hierarchical name.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Component(Bytes);

impl Component {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn from_text(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }

    /// Encodes a number as a decimal ASCII component.
    pub fn from_number(n: u64) -> Self {
        Self(Bytes::from(n.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decodes a decimal ASCII component.
    pub fn as_number(&self) -> Option<u64> {
        std::str::from_utf8(&self.0).ok()?.parse().ok()
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.0.iter() {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~' | b'=') {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "%{:02X}", b)?;
            }
        }
        Ok(())
    }
}

/// An absolute hierarchical content name.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Name(Vec<Component>);

impl Name {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Parses a `/`-separated URI into a name, skipping empty components.
    pub fn parse(uri: &str) -> Self {
        Self(
            uri.split('/')
                .filter(|s| !s.is_empty())
                .map(Component::from_text)
                .collect(),
        )
    }

    /// Appends a component, builder style.
    pub fn append(mut self, component: Component) -> Self {
        self.0.push(component);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Component> {
        self.0.get(index)
    }

    pub fn components(&self) -> &[Component] {
        &self.0
    }

    /// Returns true if `prefix`'s components lead this name.
    pub fn starts_with(&self, prefix: &Name) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for component in &self.0 {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

/// Integer peer identifier, rendered `node-<id>` on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u32);

impl PeerId {
    pub fn to_component(self) -> Component {
        Component::from_text(&format!("{}{}", PEER_PREFIX, self.0))
    }

    pub fn from_component(component: &Component) -> Result<Self, NameError> {
        let s = std::str::from_utf8(component.as_bytes()).map_err(|_| NameError::InvalidPeer)?;
        let id = s
            .strip_prefix(PEER_PREFIX)
            .and_then(|rest| rest.parse().ok())
            .ok_or(NameError::InvalidPeer)?;
        Ok(Self(id))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", PEER_PREFIX, self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", PEER_PREFIX, self.0)
    }
}

/// 32-byte digest identifying a swarm, derived from its name prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwarmId([u8; 32]);

impl SwarmId {
    /// Derives the swarm id by hashing the prefix components.
    pub fn from_prefix(prefix: &Name) -> Self {
        let mut hasher = Sha256::new();
        for component in prefix.components() {
            hasher.update((component.as_bytes().len() as u64).to_be_bytes());
            hasher.update(component.as_bytes());
        }
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0
            .iter()
            .fold(String::with_capacity(64), |mut s, b| {
                use std::fmt::Write;
                let _ = write!(s, "{:02x}", b);
                s
            })
    }
}

impl fmt::Debug for SwarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SwarmId({})", self.to_hex())
    }
}

impl fmt::Display for SwarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A classified incoming message name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// Discovery beacon from a neighbor.
    Beacon { peer: PeerId, seq: u64 },
    /// Possession advertisement; `bitmap` is the raw encoded blob.
    Bitmap {
        peer: PeerId,
        bitmap: Bytes,
        seq: u64,
    },
    /// Piece request/response for one piece id.
    Piece { piece: u32 },
    /// Producer-only content listing.
    Listing,
}

/// Classifies and builds message names for one swarm.
#[derive(Debug, Clone)]
pub struct Classifier {
    prefix: Name,
}

impl Classifier {
    pub fn new(prefix: Name) -> Self {
        Self { prefix }
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    /// Classifies an incoming name into one of the four message kinds.
    pub fn classify(&self, name: &Name) -> Result<Classified, NameError> {
        if let Some(first) = name.get(0) {
            if first.as_bytes() == KIND_BEACON {
                return self.parse_beacon(name);
            }
            if first.as_bytes() == KIND_BITMAP {
                return self.parse_bitmap(name);
            }
        }

        if name.starts_with(&self.prefix) && name.len() == self.prefix.len() + 1 {
            let last = &name.components()[name.len() - 1];
            if last.as_bytes() == KIND_LISTING {
                return Ok(Classified::Listing);
            }
            let piece = last.as_number().ok_or(NameError::InvalidNumber)?;
            let piece = u32::try_from(piece).map_err(|_| NameError::InvalidNumber)?;
            return Ok(Classified::Piece { piece });
        }

        Err(NameError::UnknownKind)
    }

    /// `/beacon/<peer>/<seq>`
    pub fn beacon_name(&self, peer: PeerId, seq: u64) -> Name {
        Name::new()
            .append(Component::new(KIND_BEACON))
            .append(peer.to_component())
            .append(Component::from_number(seq))
    }

    /// `/bitmap/<swarm-prefix>/<peer>/<blob>/<seq>`
    pub fn bitmap_name(&self, peer: PeerId, bitmap: Bytes, seq: u64) -> Name {
        let mut name = Name::new().append(Component::new(KIND_BITMAP));
        for component in self.prefix.components() {
            name = name.append(component.clone());
        }
        name.append(peer.to_component())
            .append(Component::new(bitmap))
            .append(Component::from_number(seq))
    }

    /// `/<swarm-prefix>/<piece>`
    pub fn piece_name(&self, piece: u32) -> Name {
        self.prefix
            .clone()
            .append(Component::from_number(u64::from(piece)))
    }

    /// `/<swarm-prefix>/listing`
    pub fn listing_name(&self) -> Name {
        self.prefix.clone().append(Component::new(KIND_LISTING))
    }

    fn parse_beacon(&self, name: &Name) -> Result<Classified, NameError> {
        if name.len() != 3 {
            return Err(NameError::Malformed("beacon name must have 3 components"));
        }
        let peer = PeerId::from_component(&name.components()[1])?;
        let seq = name.components()[2]
            .as_number()
            .ok_or(NameError::InvalidNumber)?;
        Ok(Classified::Beacon { peer, seq })
    }

    fn parse_bitmap(&self, name: &Name) -> Result<Classified, NameError> {
        // kind marker, then the swarm prefix, then peer/blob/seq
        let expected_len = 1 + self.prefix.len() + 3;
        if name.len() != expected_len {
            return Err(NameError::Malformed("bitmap name has wrong arity"));
        }
        let body = &name.components()[1..];
        if body[..self.prefix.len()] != self.prefix.components()[..] {
            return Err(NameError::Malformed("bitmap name for a different swarm"));
        }
        let rest = &body[self.prefix.len()..];
        let peer = PeerId::from_component(&rest[0])?;
        let bitmap = Bytes::copy_from_slice(rest[1].as_bytes());
        let seq = rest[2].as_number().ok_or(NameError::InvalidNumber)?;
        Ok(Classified::Bitmap { peer, bitmap, seq })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(Name::parse("/videos/demo"))
    }

    #[test]
    fn test_beacon_round_trip() {
        let c = classifier();
        let name = c.beacon_name(PeerId(7), 42);
        assert_eq!(name.to_string(), "/beacon/node-7/42");
        assert_eq!(
            c.classify(&name).unwrap(),
            Classified::Beacon {
                peer: PeerId(7),
                seq: 42
            }
        );
    }

    #[test]
    fn test_bitmap_round_trip() {
        let c = classifier();
        let blob = Bytes::from_static(&[1, 0, 1]);
        let name = c.bitmap_name(PeerId(3), blob.clone(), 9);
        match c.classify(&name).unwrap() {
            Classified::Bitmap { peer, bitmap, seq } => {
                assert_eq!(peer, PeerId(3));
                assert_eq!(bitmap, blob);
                assert_eq!(seq, 9);
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_piece_and_listing() {
        let c = classifier();
        assert_eq!(
            c.classify(&c.piece_name(12)).unwrap(),
            Classified::Piece { piece: 12 }
        );
        assert_eq!(c.classify(&c.listing_name()).unwrap(), Classified::Listing);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let c = classifier();
        assert_eq!(
            c.classify(&Name::parse("/somewhere/else/0")),
            Err(NameError::UnknownKind)
        );
        // right prefix, wrong depth
        assert_eq!(
            c.classify(&Name::parse("/videos/demo/a/b")),
            Err(NameError::UnknownKind)
        );
    }

    #[test]
    fn test_bitmap_for_other_swarm_rejected() {
        let c = classifier();
        let other = Classifier::new(Name::parse("/videos/other"));
        let name = other.bitmap_name(PeerId(1), Bytes::from_static(&[0]), 0);
        assert!(matches!(c.classify(&name), Err(NameError::Malformed(_))));
    }

    #[test]
    fn test_peer_component() {
        let peer = PeerId(19);
        assert_eq!(PeerId::from_component(&peer.to_component()), Ok(peer));
        assert_eq!(
            PeerId::from_component(&Component::from_text("peer-19")),
            Err(NameError::InvalidPeer)
        );
    }

    #[test]
    fn test_display_escapes_binary() {
        let name = Name::new().append(Component::new(Bytes::from_static(&[0x00, 0x41])));
        assert_eq!(name.to_string(), "/%00A");
    }

    #[test]
    fn test_swarm_id_is_stable() {
        let a = SwarmId::from_prefix(&Name::parse("/videos/demo"));
        let b = SwarmId::from_prefix(&Name::parse("/videos/demo"));
        let c = SwarmId::from_prefix(&Name::parse("/videos/other"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_hex().len(), 64);
    }
}
