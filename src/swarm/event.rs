use std::time::Duration;

use bytes::Bytes;

use crate::name::Name;

/// A message on the collaborator network, in either direction.
///
/// The network layer is expected to deliver a request to every reachable
/// neighbor and to route a response back the way its request came; how it
/// does that is not the engine's business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// A named request.
    Request(Name),
    /// A named response carrying a payload.
    Response { name: Name, payload: Bytes },
}

impl Packet {
    pub fn name(&self) -> &Name {
        match self {
            Packet::Request(name) => name,
            Packet::Response { name, .. } => name,
        }
    }
}

/// One input to the engine's state machine.
///
/// Both timer fires and network deliveries come through here, so a test can
/// drive a peer through any schedule without clocks or sockets.
#[derive(Debug, Clone)]
pub enum Event {
    /// The discovery beacon timer fired.
    BeaconTimer,
    /// The retransmission timer for an outstanding piece request fired.
    RetransmitTimer { piece: u32 },
    /// A packet arrived from the network.
    Incoming(Packet),
}

/// A side effect the driver performs on the engine's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Emit a packet now.
    Send(Packet),
    /// Emit a packet after a delay, for collision avoidance on a broadcast
    /// medium.
    SendDelayed { packet: Packet, delay: Duration },
    /// Arm the one-shot beacon timer. The engine never emits this while a
    /// beacon timer is armed.
    ArmBeacon { delay: Duration },
    /// Cancel the beacon timer.
    DisarmBeacon,
    /// Arm the retransmission timer for one outstanding request.
    ArmRetransmit { piece: u32, delay: Duration },
    /// Cancel the retransmission timer for one piece.
    DisarmRetransmit { piece: u32 },
}
