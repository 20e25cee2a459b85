use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::constants::MAX_PIECE_SIZE;
use crate::name::{Classified, Classifier, Name, NameError, PeerId, SwarmId};
use crate::piece::{PieceSet, PieceStore};

use super::beacon::BeaconScheduler;
use super::config::{PeerRole, SwarmConfig};
use super::event::{Action, Event, Packet};
use super::outstanding::{OutstandingRequestTable, RetryDecision};
use super::scarcity::ScarcityTracker;

/// Where a peer stands in the swarm lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Beaconing for neighbors with useful data.
    Discovering,
    /// Actively requesting and receiving pieces.
    Exchanging,
    /// Every piece is held; only serving others from here on.
    Complete,
}

/// The per-peer swarm state machine.
///
/// The engine is synchronous and owns no clocks or sockets: inputs arrive
/// as [`Event`]s through [`step`](Self::step), side effects leave as
/// [`Action`]s for a driver to perform. All timer state is logical (armed
/// flags and table entries inside the engine), so a cancelled timer that
/// fires anyway is recognized as stale and dropped — cancellation can never
/// race.
///
/// One instance exists per peer and owns that peer's entire mutable state;
/// peers sharing a process must not share engines.
pub struct SwarmEngine<S> {
    config: SwarmConfig,
    swarm_id: SwarmId,
    classifier: Classifier,
    store: S,
    pieces: PieceSet,
    scarcity: ScarcityTracker,
    outstanding: OutstandingRequestTable,
    beacon: BeaconScheduler,
    state: EngineState,
    beacon_seq: u64,
    advert_seq: u64,
    rng: SmallRng,
}

impl<S: PieceStore> SwarmEngine<S> {
    pub fn new(config: SwarmConfig, store: S) -> Self {
        let pieces = match config.role {
            PeerRole::Producer => PieceSet::full(config.piece_count),
            PeerRole::Consumer => PieceSet::empty(config.piece_count),
            // relays carry no possession state at all
            PeerRole::Forwarder => PieceSet::empty(0),
        };
        let scarcity = match config.role {
            PeerRole::Consumer => ScarcityTracker::new(pieces.missing()),
            _ => ScarcityTracker::new(std::iter::empty()),
        };
        let state = match config.role {
            PeerRole::Producer => EngineState::Complete,
            _ => EngineState::Discovering,
        };
        let rng = match config.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        let swarm_id = SwarmId::from_prefix(&config.swarm_prefix);
        let classifier = Classifier::new(config.swarm_prefix.clone());
        let outstanding = OutstandingRequestTable::new(config.max_retransmissions);

        Self {
            config,
            swarm_id,
            classifier,
            store,
            pieces,
            scarcity,
            outstanding,
            beacon: BeaconScheduler::new(),
            state,
            beacon_seq: 0,
            advert_seq: 0,
            rng,
        }
    }

    /// Joins the swarm: consumers arm their first beacon with a randomized
    /// delay so co-located peers don't announce in lockstep.
    pub fn start(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.config.role == PeerRole::Consumer {
            info!(peer = %self.config.peer_id, swarm = %self.swarm_id, "joining swarm");
            self.arm_beacon(&mut actions);
        }
        actions
    }

    /// Feeds one event through the state machine.
    ///
    /// Never fails: malformed or unexpected input is logged and absorbed,
    /// per the protocol's degrade-to-rediscovery policy.
    pub fn step(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::BeaconTimer => self.on_beacon_timer(),
            Event::RetransmitTimer { piece } => self.on_retransmit_timer(piece),
            Event::Incoming(packet) => self.on_packet(packet),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == EngineState::Complete
    }

    pub fn pieces(&self) -> &PieceSet {
        &self.pieces
    }

    pub fn peer_id(&self) -> PeerId {
        self.config.peer_id
    }

    pub fn swarm_id(&self) -> SwarmId {
        self.swarm_id
    }

    pub fn outstanding(&self) -> &OutstandingRequestTable {
        &self.outstanding
    }

    pub fn beacon(&self) -> &BeaconScheduler {
        &self.beacon
    }

    pub fn scarcity(&self) -> &ScarcityTracker {
        &self.scarcity
    }

    fn on_packet(&mut self, packet: Packet) -> Vec<Action> {
        if self.config.role == PeerRole::Forwarder {
            return self.maybe_forward(packet);
        }

        let classified = match self.classifier.classify(packet.name()) {
            Ok(classified) => classified,
            Err(NameError::UnknownKind) => {
                debug!(name = %packet.name(), "ignoring unknown message kind");
                return Vec::new();
            }
            Err(err) => {
                warn!(name = %packet.name(), %err, "dropping malformed name");
                return Vec::new();
            }
        };

        match (classified, packet) {
            (Classified::Beacon { peer, seq }, Packet::Request(_)) => self.on_beacon(peer, seq),
            (Classified::Bitmap { peer, bitmap, .. }, Packet::Request(name)) => {
                self.on_bitmap_request(name, peer, &bitmap)
            }
            (Classified::Bitmap { .. }, Packet::Response { payload, .. }) => {
                self.on_bitmap_response(&payload)
            }
            (Classified::Piece { piece }, Packet::Request(name)) => {
                self.on_piece_request(name, piece)
            }
            (Classified::Piece { piece }, Packet::Response { payload, .. }) => {
                self.on_piece_response(piece, payload)
            }
            (Classified::Listing, Packet::Request(name)) => self.on_listing_request(name),
            // beacons have no responses; listing responses are for the
            // application layer, not the exchange core
            _ => Vec::new(),
        }
    }

    /// A neighbor announced itself: no need to keep announcing ourselves,
    /// reply with our possession advertisement instead.
    fn on_beacon(&mut self, peer: PeerId, seq: u64) -> Vec<Action> {
        debug!(peer = %self.config.peer_id, from = %peer, seq, "beacon received");
        let mut actions = Vec::new();
        self.cancel_beacon(&mut actions);
        self.push_advertisement(&mut actions);
        actions
    }

    /// A neighbor sent its bitmap as a request: fold it into scarcity,
    /// reciprocate with our own bitmap, and start fetching if it has
    /// anything we miss.
    fn on_bitmap_request(&mut self, name: Name, peer: PeerId, blob: &[u8]) -> Vec<Action> {
        let mut actions = Vec::new();
        self.cancel_beacon(&mut actions);

        // the advertisement deserves a reply even when its bitmap is
        // unusable; only our scarcity view must stay untouched
        let delay = self.random_jitter();
        actions.push(Action::SendDelayed {
            packet: Packet::Response {
                name,
                payload: self.advert_payload(),
            },
            delay,
        });

        match PieceSet::decode(blob, self.config.piece_count) {
            Ok(neighbor) => {
                debug!(peer = %self.config.peer_id, from = %peer, held = neighbor.held(), "bitmap received");
                self.scarcity.observe(&neighbor);
                self.try_next_request(peer, &neighbor, &mut actions);
            }
            Err(err) => {
                warn!(peer = %self.config.peer_id, from = %peer, %err, "rejecting bitmap advertisement");
                // a rejected advertisement is a dead end like any other:
                // the cancelled beacon must come back
                self.arm_beacon(&mut actions);
            }
        }
        actions
    }

    /// A neighbor answered our advertisement with its own bitmap. No
    /// reciprocal reply here — the exchange is bounded at one round trip.
    fn on_bitmap_response(&mut self, payload: &[u8]) -> Vec<Action> {
        let mut actions = Vec::new();
        self.cancel_beacon(&mut actions);

        let Some((peer, blob)) = split_advert_payload(payload) else {
            warn!(peer = %self.config.peer_id, "rejecting truncated bitmap response");
            self.arm_beacon(&mut actions);
            return actions;
        };
        match PieceSet::decode(blob, self.config.piece_count) {
            Ok(neighbor) => {
                debug!(peer = %self.config.peer_id, from = %peer, held = neighbor.held(), "bitmap response received");
                self.scarcity.observe(&neighbor);
                self.try_next_request(peer, &neighbor, &mut actions);
            }
            Err(err) => {
                warn!(peer = %self.config.peer_id, from = %peer, %err, "rejecting bitmap advertisement");
                self.arm_beacon(&mut actions);
            }
        }
        actions
    }

    /// Serve a piece we hold; stay silent otherwise (absence and loss are
    /// indistinguishable on this network by design of the retry policy).
    fn on_piece_request(&mut self, name: Name, piece: u32) -> Vec<Action> {
        if !self.pieces.has(piece) {
            return Vec::new();
        }
        let Some(payload) = self.store.get(piece) else {
            return Vec::new();
        };
        debug!(peer = %self.config.peer_id, piece, "serving piece");
        let delay = self.random_jitter();
        vec![Action::SendDelayed {
            packet: Packet::Response { name, payload },
            delay,
        }]
    }

    fn on_piece_response(&mut self, piece: u32, payload: Bytes) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.state == EngineState::Complete {
            return actions;
        }
        if payload.len() > MAX_PIECE_SIZE {
            warn!(peer = %self.config.peer_id, piece, len = payload.len(), "dropping oversized piece payload");
            return actions;
        }

        let resolved = self.outstanding.on_response(piece);
        if resolved.is_some() {
            actions.push(Action::DisarmRetransmit { piece });
        }

        if !self.pieces.has(piece) {
            self.pieces.mark_acquired(piece);
            self.store.put(piece, payload);
            self.scarcity.remove(piece);
            debug!(peer = %self.config.peer_id, piece, held = self.pieces.held(), "piece acquired");
        }

        if self.pieces.is_complete() {
            self.on_download_complete(&mut actions);
            return actions;
        }

        match resolved {
            // pipeline: pick the next piece from the same neighbor without
            // waiting for another advertisement round
            Some(request) => {
                self.try_next_request(request.target, &request.snapshot, &mut actions);
            }
            // unsolicited data absorbed; make sure we don't stall silently
            None => {
                if self.outstanding.is_empty() {
                    self.arm_beacon(&mut actions);
                }
            }
        }
        actions
    }

    fn on_listing_request(&mut self, name: Name) -> Vec<Action> {
        if self.config.role != PeerRole::Producer {
            return Vec::new();
        }
        debug!(peer = %self.config.peer_id, "serving content listing");
        let mut payload = BytesMut::with_capacity(4);
        payload.put_u32(self.config.piece_count);
        let delay = self.random_jitter();
        vec![Action::SendDelayed {
            packet: Packet::Response {
                name,
                payload: payload.freeze(),
            },
            delay,
        }]
    }

    fn on_beacon_timer(&mut self) -> Vec<Action> {
        if !self.beacon.on_fired() {
            debug!(peer = %self.config.peer_id, "stale beacon fire dropped");
            return Vec::new();
        }
        if self.state == EngineState::Complete {
            return Vec::new();
        }
        let name = self.classifier.beacon_name(self.config.peer_id, self.beacon_seq);
        self.beacon_seq += 1;
        debug!(peer = %self.config.peer_id, %name, "sending beacon");

        let mut actions = vec![Action::Send(Packet::Request(name))];
        // keep announcing until an answer arrives; progress cancels this
        self.arm_beacon(&mut actions);
        actions
    }

    fn on_retransmit_timer(&mut self, piece: u32) -> Vec<Action> {
        match self.outstanding.on_timeout(piece) {
            RetryDecision::Stale => {
                debug!(peer = %self.config.peer_id, piece, "stale retransmit fire dropped");
                Vec::new()
            }
            RetryDecision::Retransmit { attempt } => {
                debug!(peer = %self.config.peer_id, piece, attempt, "retransmitting piece request");
                vec![
                    Action::Send(Packet::Request(self.classifier.piece_name(piece))),
                    Action::ArmRetransmit {
                        piece,
                        delay: self.config.retransmit_timeout,
                    },
                ]
            }
            RetryDecision::GiveUp { target } => {
                info!(peer = %self.config.peer_id, piece, %target, "request abandoned, falling back to discovery");
                let mut actions = Vec::new();
                if self.outstanding.is_empty() {
                    self.state = EngineState::Discovering;
                }
                self.arm_beacon(&mut actions);
                actions
            }
        }
    }

    /// Registers and sends a request for the rarest piece the neighbor can
    /// provide. Falls back to beaconing when the neighbor has nothing left
    /// for us.
    fn try_next_request(&mut self, target: PeerId, neighbor: &PieceSet, actions: &mut Vec<Action>) {
        if self.state == EngineState::Complete {
            return;
        }
        let outstanding = &self.outstanding;
        let candidate = self
            .scarcity
            .select_candidate(neighbor, |piece| outstanding.is_outstanding(piece));

        let Some(piece) = candidate else {
            debug!(peer = %self.config.peer_id, %target, "no candidate piece, rescheduling beacon");
            self.arm_beacon(actions);
            return;
        };

        // registering before the (possibly delayed) send keeps the
        // one-request-per-piece invariant airtight
        if let Err(err) = self.outstanding.add(piece, target, neighbor.clone()) {
            debug!(peer = %self.config.peer_id, %err, "suppressing duplicate request");
            return;
        }
        self.state = EngineState::Exchanging;
        debug!(peer = %self.config.peer_id, piece, %target, "requesting piece");

        actions.push(Action::ArmRetransmit {
            piece,
            delay: self.config.retransmit_timeout,
        });
        let delay = self.random_jitter();
        actions.push(Action::SendDelayed {
            packet: Packet::Request(self.classifier.piece_name(piece)),
            delay,
        });
    }

    fn on_download_complete(&mut self, actions: &mut Vec<Action>) {
        self.state = EngineState::Complete;
        info!(peer = %self.config.peer_id, swarm = %self.swarm_id, "download complete");
        self.cancel_beacon(actions);
        for piece in self.outstanding.clear() {
            actions.push(Action::DisarmRetransmit { piece });
        }
    }

    /// Relay path for pure forwarders: re-emit the packet unmodified with
    /// probability `forward_probability` percent, after a random delay.
    fn maybe_forward(&mut self, packet: Packet) -> Vec<Action> {
        let draw = self.rng.random_range(1..=100u32);
        if draw > u32::from(self.config.forward_probability) {
            debug!(peer = %self.config.peer_id, name = %packet.name(), "not relaying");
            return Vec::new();
        }
        debug!(peer = %self.config.peer_id, name = %packet.name(), "relaying");
        let delay = self.random_jitter();
        vec![Action::SendDelayed { packet, delay }]
    }

    fn push_advertisement(&mut self, actions: &mut Vec<Action>) {
        let name =
            self.classifier
                .bitmap_name(self.config.peer_id, self.pieces.encode(), self.advert_seq);
        self.advert_seq += 1;
        let delay = self.random_jitter();
        actions.push(Action::SendDelayed {
            packet: Packet::Request(name),
            delay,
        });
    }

    /// Bitmap response payload: our peer id (big-endian) followed by the
    /// encoded possession vector, so the requester knows who answered.
    fn advert_payload(&self) -> Bytes {
        let bitmap = self.pieces.encode();
        let mut payload = BytesMut::with_capacity(4 + bitmap.len());
        payload.put_u32(self.config.peer_id.0);
        payload.put_slice(&bitmap);
        payload.freeze()
    }

    fn arm_beacon(&mut self, actions: &mut Vec<Action>) {
        if self.state == EngineState::Complete || self.config.role != PeerRole::Consumer {
            return;
        }
        let delay = self.config.beacon_period + self.random_jitter();
        if let Some(delay) = self.beacon.schedule(delay) {
            actions.push(Action::ArmBeacon { delay });
        }
    }

    fn cancel_beacon(&mut self, actions: &mut Vec<Action>) {
        if self.beacon.cancel() {
            actions.push(Action::DisarmBeacon);
        }
    }

    fn random_jitter(&mut self) -> Duration {
        let range = self.config.jitter.as_millis() as u64;
        if range == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.rng.random_range(0..=range))
    }
}

fn split_advert_payload(payload: &[u8]) -> Option<(PeerId, &[u8])> {
    if payload.len() < 4 {
        return None;
    }
    let (mut head, blob) = payload.split_at(4);
    Some((PeerId(head.get_u32()), blob))
}
