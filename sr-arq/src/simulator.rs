//! Discrete-event channel emulator.
//!
//! Exercising the reliability mechanisms needs a medium that misbehaves on
//! demand.  [`Simulator`] wires one [`Sender`] to one [`Receiver`] through an
//! emulated link and drives both from a single time-ordered event queue:
//!
//! | Fault        | Description                                              |
//! |--------------|----------------------------------------------------------|
//! | Packet loss  | Drop a packet with probability `loss`.                   |
//! | Corruption   | XOR a random byte of the wire image with probability `corrupt`. |
//! | Delay        | Each packet takes `1 + 9·U(0,1)` time units.             |
//!
//! Packets travelling in the same direction are never reordered: a packet
//! never arrives before the one sent ahead of it.
//!
//! The emulator also plays the application on both ends.  It generates
//! messages at random intervals, queues any message the sender rejects with
//! [`SubmitError::WindowFull`] and retries it after the next ACK, and records
//! every delivered payload so a run can be checked for in-order,
//! exactly-once delivery.
//!
//! All randomness comes from a seeded [`SmallRng`], so a run is fully
//! determined by its [`SimulatorConfig`].

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::config::Config;
use crate::env::{Application, Channel, Side, TimerControl};
use crate::packet::{Message, Packet, Payload, PAYLOAD_SIZE, WIRE_LEN};
use crate::receiver::{Receiver, ReceiverStats};
use crate::sender::{Sender, SenderStats, SubmitError};
use crate::timer::TimerSlot;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Largest accepted workload.
pub const MAX_MESSAGES: usize = 1_000_000;

/// Fault model and workload.
///
/// Probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Number of messages the application generates.
    pub messages: usize,
    /// Probability that a packet is silently dropped.
    pub loss: f64,
    /// Probability that a surviving packet is damaged.
    pub corrupt: f64,
    /// Mean time between generated messages.
    pub mean_interval: f64,
    /// Seed for the emulator's RNG.
    pub seed: u64,
    /// Simulated time after which the run is abandoned.
    pub max_time: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default — the channel is a plain delay line.
        Self {
            messages: 20,
            loss: 0.0,
            corrupt: 0.0,
            mean_interval: 10.0,
            seed: 0x5EED,
            max_time: 1_000_000.0,
        }
    }
}

/// Rejected emulator settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulatorError {
    #[error("{name} must be a probability in [0, 1], got {value}")]
    Probability { name: &'static str, value: f64 },
    #[error("mean message interval must be positive and finite, got {0}")]
    Interval(f64),
    #[error("time limit must be positive and finite, got {0}")]
    TimeLimit(f64),
    #[error("message count {0} exceeds the maximum of {}", MAX_MESSAGES)]
    TooManyMessages(usize),
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), SimulatorError> {
        for (name, value) in [("loss", self.loss), ("corrupt", self.corrupt)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SimulatorError::Probability { name, value });
            }
        }
        if !self.mean_interval.is_finite() || self.mean_interval <= 0.0 {
            return Err(SimulatorError::Interval(self.mean_interval));
        }
        if !self.max_time.is_finite() || self.max_time <= 0.0 {
            return Err(SimulatorError::TimeLimit(self.max_time));
        }
        if self.messages > MAX_MESSAGES {
            return Err(SimulatorError::TooManyMessages(self.messages));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Statistics and report
// ---------------------------------------------------------------------------

/// Per-direction link counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub sent: u64,
    pub lost: u64,
    pub corrupted: u64,
}

/// Link counters for both directions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Data packets, sender → receiver.
    pub data: LinkStats,
    /// ACK packets, receiver → sender.
    pub acks: LinkStats,
}

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct Report {
    /// Payloads in the order the application generated them.
    pub generated: Vec<Payload>,
    /// Payloads in the order the receiver delivered them.
    pub delivered: Vec<Payload>,
    pub sender: SenderStats,
    pub receiver: ReceiverStats,
    pub channel: ChannelStats,
    pub end_time: f64,
    /// `false` when the run hit the time limit or ran out of events first.
    pub completed: bool,
}

impl Report {
    /// `true` iff every generated payload was delivered once, in order.
    pub fn in_order(&self) -> bool {
        self.delivered == self.generated
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.sender;
        let r = &self.receiver;
        let c = &self.channel;
        let outcome = if self.completed { "completed" } else { "stopped" };
        writeln!(f, "simulation {outcome} at t={:.2}", self.end_time)?;
        writeln!(f, "  messages generated      : {}", self.generated.len())?;
        writeln!(f, "  messages delivered      : {}", self.delivered.len())?;
        writeln!(f, "  delivered in order      : {}", self.in_order())?;
        writeln!(f, "  [A] packets sent        : {}", s.packets_sent)?;
        writeln!(f, "  [A] packets resent      : {}", s.packets_resent)?;
        writeln!(f, "  [A] timeouts            : {}", s.timeouts)?;
        writeln!(f, "  [A] window-full rejects : {}", s.window_full)?;
        writeln!(f, "  [A] ACKs received (new) : {} ({})", s.acks_received, s.new_acks)?;
        writeln!(f, "  [A] corrupted / stale   : {} / {}", s.corrupted_acks, s.stale_acks)?;
        writeln!(f, "  [B] packets received    : {}", r.packets_received)?;
        writeln!(f, "  [B] duplicates          : {}", r.duplicates)?;
        writeln!(f, "  [B] out of window       : {}", r.out_of_window)?;
        writeln!(f, "  [B] corrupted           : {}", r.corrupted)?;
        writeln!(f, "  [B] malformed           : {}", r.malformed)?;
        writeln!(f, "  [B] ACKs sent           : {}", r.acks_sent)?;
        writeln!(f, "  link A→B sent/lost/corr : {}/{}/{}", c.data.sent, c.data.lost, c.data.corrupted)?;
        write!(f, "  link B→A sent/lost/corr : {}/{}/{}", c.acks.sent, c.acks.lost, c.acks.corrupted)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum EventKind {
    FromApplication,
    Arrival { to: Side, packet: Packet },
    TimerFired { side: Side, generation: u64 },
}

#[derive(Debug, Clone)]
struct Event {
    time: f64,
    /// Insertion counter; breaks ties first-in first-out.
    order: u64,
    kind: EventKind,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    // Reversed so that `BinaryHeap` pops the earliest event.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.order.cmp(&self.order))
    }
}

// ---------------------------------------------------------------------------
// Link: the environment handed to the state machines
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Link {
    now: f64,
    queue: BinaryHeap<Event>,
    order: u64,
    rng: SmallRng,
    loss: f64,
    corrupt: f64,
    /// Latest scheduled arrival per destination, indexed by [`slot`].
    last_arrival: [f64; 2],
    timers: [TimerSlot; 2],
    delivered: Vec<Payload>,
    stats: ChannelStats,
}

#[inline]
fn slot(side: Side) -> usize {
    match side {
        Side::Sender => 0,
        Side::Receiver => 1,
    }
}

impl Link {
    fn schedule(&mut self, time: f64, kind: EventKind) {
        self.order += 1;
        self.queue.push(Event {
            time,
            order: self.order,
            kind,
        });
    }

    fn link_stats(&mut self, from: Side) -> &mut LinkStats {
        match from {
            Side::Sender => &mut self.stats.data,
            Side::Receiver => &mut self.stats.acks,
        }
    }

    /// Damage one random byte of the packet's wire image.
    fn damage(&mut self, packet: &Packet) -> Option<Packet> {
        let mut bytes = packet.encode();
        let pos = self.rng.gen_range(0..WIRE_LEN);
        let mask: u8 = self.rng.gen_range(1..=u8::MAX);
        bytes[pos] ^= mask;
        match Packet::decode(&bytes) {
            Ok(p) => Some(p),
            Err(e) => {
                log::warn!("[sim] damaged packet failed to decode: {e}");
                None
            }
        }
    }
}

impl Channel for Link {
    fn send_packet(&mut self, from: Side, packet: Packet) {
        let to = from.peer();
        self.link_stats(from).sent += 1;

        if self.rng.gen_bool(self.loss) {
            self.link_stats(from).lost += 1;
            log::debug!("[sim] {}→{} packet lost", from, to);
            return;
        }

        let packet = if self.rng.gen_bool(self.corrupt) {
            self.link_stats(from).corrupted += 1;
            log::debug!("[sim] {}→{} packet corrupted", from, to);
            match self.damage(&packet) {
                Some(p) => p,
                None => return,
            }
        } else {
            packet
        };

        let start = self.now.max(self.last_arrival[slot(to)]);
        let arrival = start + 1.0 + 9.0 * self.rng.gen::<f64>();
        self.last_arrival[slot(to)] = arrival;
        self.schedule(arrival, EventKind::Arrival { to, packet });
    }
}

impl TimerControl for Link {
    fn start_timer(&mut self, side: Side, interval: f64) {
        let generation = self.timers[slot(side)].start(self.now, interval);
        self.schedule(
            self.now + interval,
            EventKind::TimerFired { side, generation },
        );
    }

    fn stop_timer(&mut self, side: Side) {
        if !self.timers[slot(side)].stop() {
            log::debug!("[sim] stop_timer({side}) with no timer running");
        }
    }
}

impl Application for Link {
    fn deliver(&mut self, side: Side, payload: &Payload) {
        log::debug!("[sim] {} delivered {:?}", side, String::from_utf8_lossy(&payload[4..]));
        self.delivered.push(*payload);
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// One sender, one receiver and the emulated link between them.
#[derive(Debug)]
pub struct Simulator {
    config: SimulatorConfig,
    link: Link,
    sender: Sender,
    receiver: Receiver,
    generated: Vec<Payload>,
    /// Messages waiting for room in the send window, oldest first.
    backlog: VecDeque<Message>,
}

impl Simulator {
    pub fn new(engine: &Config, config: SimulatorConfig) -> Result<Self, SimulatorError> {
        config.validate()?;
        let mut link = Link {
            now: 0.0,
            queue: BinaryHeap::new(),
            order: 0,
            rng: SmallRng::seed_from_u64(config.seed),
            loss: config.loss,
            corrupt: config.corrupt,
            last_arrival: [0.0; 2],
            timers: [TimerSlot::new(), TimerSlot::new()],
            delivered: Vec::new(),
            stats: ChannelStats::default(),
        };
        if config.messages > 0 {
            let first = link.rng.gen_range(0.0..2.0 * config.mean_interval);
            link.schedule(first, EventKind::FromApplication);
        }
        Ok(Self {
            link,
            sender: Sender::new(engine),
            receiver: Receiver::new(engine),
            generated: Vec::new(),
            backlog: VecDeque::new(),
            config,
        })
    }

    /// Run to completion and return the report.
    pub fn run(mut self) -> Report {
        while self.step() {}
        self.into_report()
    }

    /// Process the next event.
    ///
    /// Returns `false` once the run is finished: everything delivered and
    /// acknowledged, the queue drained, or the time limit reached.
    pub fn step(&mut self) -> bool {
        if self.is_complete() {
            return false;
        }
        let Some(event) = self.link.queue.pop() else {
            log::warn!("[sim] event queue drained before completion");
            return false;
        };
        if event.time > self.config.max_time {
            log::warn!("[sim] time limit {} reached", self.config.max_time);
            return false;
        }
        self.link.now = event.time;

        match event.kind {
            EventKind::FromApplication => self.on_application(),
            EventKind::Arrival {
                to: Side::Receiver,
                packet,
            } => {
                self.receiver.on_packet(&packet, &mut self.link);
            }
            EventKind::Arrival {
                to: Side::Sender,
                packet,
            } => {
                self.sender.on_ack(&packet, &mut self.link);
                self.flush_backlog();
            }
            EventKind::TimerFired { side, generation } => {
                if !self.link.timers[slot(side)].fire(generation) {
                    log::trace!("[sim] stale timer event for {side}");
                } else if side == Side::Sender {
                    self.sender.on_timeout(&mut self.link);
                } else {
                    log::warn!("[sim] unexpected timer for {side}");
                }
            }
        }

        debug_assert!(self.sender.window_count() <= self.sender.window_size());
        true
    }

    /// `true` once every message has been generated, delivered and acknowledged.
    pub fn is_complete(&self) -> bool {
        self.generated.len() == self.config.messages
            && self.backlog.is_empty()
            && self.sender.is_idle()
            && self.link.delivered.len() == self.config.messages
    }

    pub fn now(&self) -> f64 {
        self.link.now
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    pub fn receiver(&self) -> &Receiver {
        &self.receiver
    }

    /// Payloads delivered so far.
    pub fn delivered(&self) -> &[Payload] {
        &self.link.delivered
    }

    /// Whether the sender's timer is currently armed.
    pub fn sender_timer_running(&self) -> bool {
        self.link.timers[slot(Side::Sender)].is_running()
    }

    pub fn into_report(self) -> Report {
        let completed = self.is_complete();
        Report {
            generated: self.generated,
            delivered: self.link.delivered,
            sender: *self.sender.stats(),
            receiver: *self.receiver.stats(),
            channel: self.link.stats,
            end_time: self.link.now,
            completed,
        }
    }

    fn on_application(&mut self) {
        let index = self.generated.len();
        let payload = message_payload(index);
        self.generated.push(payload);
        self.backlog.push_back(Message::new(payload));
        log::debug!(
            "[sim] application message {} (backlog {})",
            index,
            self.backlog.len()
        );
        self.flush_backlog();

        if self.generated.len() < self.config.messages {
            let gap = self.link.rng.gen_range(0.0..2.0 * self.config.mean_interval);
            let at = self.link.now + gap;
            self.link.schedule(at, EventKind::FromApplication);
        }
    }

    /// Submit backlogged messages until the window fills.
    fn flush_backlog(&mut self) {
        while let Some(&message) = self.backlog.front() {
            match self.sender.submit(message, &mut self.link) {
                Ok(_) => {
                    self.backlog.pop_front();
                }
                Err(SubmitError::WindowFull(_)) => break,
            }
        }
    }
}

/// Payload of the `index`-th generated message: a big-endian index followed
/// by a repeated letter.
pub fn message_payload(index: usize) -> Payload {
    let mut data = [b'a' + (index % 26) as u8; PAYLOAD_SIZE];
    data[..4].copy_from_slice(&(index as u32).to_be_bytes());
    data
}
