use std::time::Duration;

use crate::constants::{
    DEFAULT_BEACON_PERIOD, DEFAULT_FORWARD_PROBABILITY, DEFAULT_JITTER,
    DEFAULT_RETRANSMIT_TIMEOUT, MAX_RETRANSMISSIONS,
};
use crate::name::{Name, PeerId};

/// What part a peer plays in the swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    /// Starts holding every piece; serves pieces, advertisements and the
    /// content listing, and never fetches.
    Producer,
    /// Starts empty; discovers neighbors and fetches missing pieces
    /// rarest-first.
    Consumer,
    /// Holds no piece state; probabilistically relays traffic to extend
    /// reach across a multi-hop topology.
    Forwarder,
}

/// Per-peer configuration for one swarm.
///
/// Every peer gets its own copy; nothing here is shared or global. The
/// `rng_seed` makes a peer's jitter and forwarding draws reproducible,
/// which the deterministic tests rely on.
#[derive(Debug, Clone)]
pub struct SwarmConfig {
    /// Name prefix all piece names of this swarm share.
    pub swarm_prefix: Name,
    /// Total number of pieces, known up front from swarm metadata.
    pub piece_count: u32,
    /// This peer's identifier.
    pub peer_id: PeerId,
    /// The peer's role in the swarm.
    pub role: PeerRole,
    /// Base delay between discovery beacons.
    pub beacon_period: Duration,
    /// Random jitter range added to the beacon period and used to delay
    /// replies and relayed packets.
    pub jitter: Duration,
    /// How long an outstanding piece request waits before retransmission.
    pub retransmit_timeout: Duration,
    /// Retransmissions per request before giving up on the neighbor.
    pub max_retransmissions: u8,
    /// Percent chance a forwarder relays a packet; ignored for other roles.
    pub forward_probability: u8,
    /// Seed for the peer's private RNG; `None` draws one from the OS.
    pub rng_seed: Option<u64>,
}

impl SwarmConfig {
    /// Creates a configuration with the default timers and budgets.
    pub fn new(swarm_prefix: Name, piece_count: u32, peer_id: PeerId, role: PeerRole) -> Self {
        Self {
            swarm_prefix,
            piece_count,
            peer_id,
            role,
            beacon_period: DEFAULT_BEACON_PERIOD,
            jitter: DEFAULT_JITTER,
            retransmit_timeout: DEFAULT_RETRANSMIT_TIMEOUT,
            max_retransmissions: MAX_RETRANSMISSIONS,
            forward_probability: DEFAULT_FORWARD_PROBABILITY,
            rng_seed: None,
        }
    }
}
