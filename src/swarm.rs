//! The swarm membership and piece-exchange core.
//!
//! One [`SwarmEngine`] per peer drives discovery beacons, bitmap
//! advertisement exchange, rarest-first piece selection, and bounded
//! retransmission. The engine is a synchronous state machine fed by
//! [`Event`]s and answering with [`Action`]s; see [`crate::service`] for
//! the tokio driver that connects it to real timers and a packet channel.

mod beacon;
mod config;
mod engine;
mod error;
mod event;
mod outstanding;
mod scarcity;

pub use beacon::BeaconScheduler;
pub use config::{PeerRole, SwarmConfig};
pub use engine::{EngineState, SwarmEngine};
pub use error::SwarmError;
pub use event::{Action, Event, Packet};
pub use outstanding::{OutstandingRequest, OutstandingRequestTable, RetryDecision};
pub use scarcity::ScarcityTracker;
