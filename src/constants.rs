//! Protocol constants and tuning parameters.
//!
//! This module contains the constants used throughout the swarm exchange
//! implementation: timer defaults, retry budgets, and size bounds.
//!
//! The timing defaults follow the original ad hoc deployments of the
//! protocol, scaled for real (non-simulated) link delays.

use std::time::Duration;

// ============================================================================
// Discovery
// ============================================================================

/// Base delay between discovery beacons.
///
/// The actual delay adds a random jitter on top (see [`DEFAULT_JITTER`]) so
/// that peers sharing a broadcast medium do not beacon in lockstep.
pub const DEFAULT_BEACON_PERIOD: Duration = Duration::from_secs(2);

/// Default random jitter range.
///
/// Applied on top of the beacon period, and used as the delay bound for
/// replies and relayed packets on the broadcast medium.
pub const DEFAULT_JITTER: Duration = Duration::from_millis(20);

// ============================================================================
// Piece exchange
// ============================================================================

/// How long an outstanding piece request waits before retransmission.
pub const DEFAULT_RETRANSMIT_TIMEOUT: Duration = Duration::from_millis(500);

/// Maximum number of retransmissions per piece request.
///
/// A request is sent once and retransmitted up to this many times; the next
/// expiry abandons it and the peer falls back to discovery.
pub const MAX_RETRANSMISSIONS: u8 = 3;

/// Upper bound on a piece payload.
///
/// Responses with larger payloads are treated as malformed and dropped.
pub const MAX_PIECE_SIZE: usize = 16 * 1024;

// ============================================================================
// Forwarding
// ============================================================================

/// Default relay probability (percent) for pure forwarders.
pub const DEFAULT_FORWARD_PROBABILITY: u8 = 50;

// ============================================================================
// Service
// ============================================================================

/// Capacity of the packet channels between the service and the network
/// collaborator.
pub const PACKET_CHANNEL_CAPACITY: usize = 64;
