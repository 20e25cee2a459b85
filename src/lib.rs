//! nswarm - swarm content distribution over named-content networks
//!
//! This library implements a BitTorrent-style swarm exchange for pull-based,
//! named-content delivery: peers discover each other with periodic beacons,
//! trade possession bitmaps, and fetch the pieces they miss rarest-first,
//! with bounded retransmission and graceful fallback to re-discovery.
//!
//! # Modules
//!
//! - [`name`] - Hierarchical content names, message classification, swarm ids
//! - [`piece`] - Possession bitmaps and piece payload storage
//! - [`swarm`] - The exchange engine: beacons, scarcity, outstanding requests
//! - [`service`] - Tokio driver connecting an engine to channels and timers
//! - [`constants`] - Protocol constants and tuning parameters
//!
//! The engine itself is a synchronous state machine (events in, actions
//! out), so protocol behavior is testable without clocks or sockets; the
//! service module supplies the asynchronous shell around it.

pub mod constants;
pub mod name;
pub mod piece;
pub mod service;
pub mod swarm;

pub use name::{Classified, Classifier, Component, Name, NameError, PeerId, SwarmId};
pub use piece::{MemoryStore, PieceError, PieceSet, PieceStore};
pub use service::SwarmService;
pub use swarm::{
    Action, BeaconScheduler, EngineState, Event, OutstandingRequest, OutstandingRequestTable,
    Packet, PeerRole, RetryDecision, ScarcityTracker, SwarmConfig, SwarmEngine, SwarmError,
};
