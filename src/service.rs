//! Tokio driver for one swarm peer.
//!
//! [`SwarmService`] owns a [`SwarmEngine`] and wires it to the collaborator
//! network through a pair of packet channels: everything the engine wants
//! sent goes out on one, everything the network delivers comes in on the
//! other. The engine's timer directives (`ArmBeacon`, `ArmRetransmit`,
//! delayed sends) become real tokio deadlines here; the engine itself never
//! touches a clock.
//!
//! # Examples
//!
//! ```no_run
//! use nswarm::{MemoryStore, Name, PeerId, PeerRole, SwarmConfig, SwarmEngine, SwarmService};
//! use nswarm::constants::PACKET_CHANNEL_CAPACITY;
//! use tokio::sync::mpsc;
//!
//! # async fn example() {
//! let config = SwarmConfig::new(Name::parse("/videos/demo"), 64, PeerId(1), PeerRole::Consumer);
//! let engine = SwarmEngine::new(config, MemoryStore::empty(64));
//!
//! // the network collaborator owns the other ends of these channels
//! let (incoming_tx, incoming_rx) = mpsc::channel(PACKET_CHANNEL_CAPACITY);
//! let (outgoing_tx, mut outgoing_rx) = mpsc::channel(PACKET_CHANNEL_CAPACITY);
//!
//! let (service, mut complete) = SwarmService::new(engine, incoming_rx, outgoing_tx);
//! service.spawn();
//!
//! // wait for the download to finish
//! let _ = complete.wait_for(|done| *done).await;
//! # }
//! ```

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::piece::PieceStore;
use crate::swarm::{Action, Event, Packet, SwarmEngine};

/// A packet waiting out its collision-avoidance delay.
///
/// Ordered by deadline, then by submission sequence so same-instant sends
/// keep their order (min-heap over a max-heap, so comparisons reverse).
struct DelayedSend {
    at: Instant,
    seq: u64,
    packet: Packet,
}

impl PartialEq for DelayedSend {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for DelayedSend {}

impl PartialOrd for DelayedSend {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedSend {
    fn cmp(&self, other: &Self) -> Ordering {
        match other.at.cmp(&self.at) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

/// Runs one peer's engine over channels and real timers.
pub struct SwarmService<S> {
    engine: SwarmEngine<S>,
    incoming: mpsc::Receiver<Packet>,
    outgoing: mpsc::Sender<Packet>,
    beacon_deadline: Option<Instant>,
    retransmit_deadlines: HashMap<u32, Instant>,
    delayed: BinaryHeap<DelayedSend>,
    delayed_seq: u64,
    complete_tx: watch::Sender<bool>,
}

impl<S: PieceStore> SwarmService<S> {
    /// Wraps an engine. Returns the service and a watch that flips to true
    /// once the peer holds every piece.
    pub fn new(
        engine: SwarmEngine<S>,
        incoming: mpsc::Receiver<Packet>,
        outgoing: mpsc::Sender<Packet>,
    ) -> (Self, watch::Receiver<bool>) {
        let (complete_tx, complete_rx) = watch::channel(engine.is_complete());
        (
            Self {
                engine,
                incoming,
                outgoing,
                beacon_deadline: None,
                retransmit_deadlines: HashMap::new(),
                delayed: BinaryHeap::new(),
                delayed_seq: 0,
                complete_tx,
            },
            complete_rx,
        )
    }

    /// Runs the service on a new task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Processes events until the incoming channel closes.
    pub async fn run(mut self) {
        let actions = self.engine.start();
        self.apply(actions).await;

        loop {
            let deadline = self.earliest_deadline();
            tokio::select! {
                received = self.incoming.recv() => {
                    match received {
                        Some(packet) => {
                            let actions = self.engine.step(Event::Incoming(packet));
                            self.apply(actions).await;
                        }
                        None => {
                            debug!(peer = %self.engine.peer_id(), "incoming channel closed, stopping");
                            break;
                        }
                    }
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire_due().await;
                }
            }
        }
    }

    fn earliest_deadline(&self) -> Option<Instant> {
        let mut next = self.beacon_deadline;
        if let Some(&deadline) = self.retransmit_deadlines.values().min() {
            next = Some(next.map_or(deadline, |n| n.min(deadline)));
        }
        if let Some(head) = self.delayed.peek() {
            next = Some(next.map_or(head.at, |n| n.min(head.at)));
        }
        next
    }

    /// Dispatches every deadline that has come due.
    async fn fire_due(&mut self) {
        let now = Instant::now();

        while self.delayed.peek().is_some_and(|head| head.at <= now) {
            if let Some(send) = self.delayed.pop() {
                self.send(send.packet).await;
            }
        }

        if self.beacon_deadline.is_some_and(|deadline| deadline <= now) {
            self.beacon_deadline = None;
            let actions = self.engine.step(Event::BeaconTimer);
            self.apply(actions).await;
        }

        let due: Vec<u32> = self
            .retransmit_deadlines
            .iter()
            .filter(|(_, &deadline)| deadline <= now)
            .map(|(&piece, _)| piece)
            .collect();
        for piece in due {
            self.retransmit_deadlines.remove(&piece);
            let actions = self.engine.step(Event::RetransmitTimer { piece });
            self.apply(actions).await;
        }
    }

    async fn apply(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Send(packet) => self.send(packet).await,
                Action::SendDelayed { packet, delay } => {
                    self.delayed_seq += 1;
                    self.delayed.push(DelayedSend {
                        at: Instant::now() + delay,
                        seq: self.delayed_seq,
                        packet,
                    });
                }
                Action::ArmBeacon { delay } => {
                    self.beacon_deadline = Some(Instant::now() + delay);
                }
                Action::DisarmBeacon => {
                    self.beacon_deadline = None;
                }
                Action::ArmRetransmit { piece, delay } => {
                    self.retransmit_deadlines
                        .insert(piece, Instant::now() + delay);
                }
                Action::DisarmRetransmit { piece } => {
                    self.retransmit_deadlines.remove(&piece);
                }
            }
        }
        if self.engine.is_complete() {
            let _ = self.complete_tx.send(true);
        }
    }

    async fn send(&self, packet: Packet) {
        if self.outgoing.send(packet).await.is_err() {
            debug!(peer = %self.engine.peer_id(), "outgoing channel closed, dropping packet");
        }
    }
}
