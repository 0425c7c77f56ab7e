//! Selective-Repeat send-side state machine.
//!
//! [`Sender`] keeps up to `window_size` packets in flight, each acknowledged
//! individually.  It does **not** own the channel or the clock; every entry
//! point takes the environment ([`Channel`] + [`TimerControl`]) as an argument.
//!
//! # Protocol contract
//!
//! - At most `window_size` packets are outstanding.  A message submitted to a
//!   full window is rejected with [`SubmitError::WindowFull`]; nothing is
//!   buffered internally.
//! - ACKs are **individual**: `acknum = K` marks exactly packet `K`.
//! - The window slides only over an acknowledged **front** slot, so packets
//!   retire in sequence order.
//! - One timer covers the oldest outstanding packet.  It is started when the
//!   window goes from empty to non-empty, restarted after every in-window ACK
//!   and after every timeout, and stopped when the window empties.
//!
//! # Window layout
//!
//! ```text
//!   window_first                       (window_first + window_count) % W
//!        │                                          │
//!  slots ▼                                          ▼
//!  ┌────┬────┬────┬────┬────┬────┐
//!  │ s0 │ s1 │ s2 │    │    │    │   W = window_size slots, circular
//!  └────┴────┴────┴────┴────┴────┘
//!    base   base+1  base+2 = next_seq - 1          (sequence numbers mod SEQSPACE)
//! ```
//!
//! Slot index and sequence number are decoupled: the slot at offset `k` from
//! `window_first` always holds sequence number `base + k`, and every stored
//! packet carries its own sequence number.

use thiserror::Error;

use crate::config::{Config, RetransmitPolicy};
use crate::env::{Channel, Side, TimerControl};
use crate::packet::{Message, Packet};
use crate::seq_space::SeqSpace;

// ---------------------------------------------------------------------------
// Errors and outcomes
// ---------------------------------------------------------------------------

/// Rejection returned by [`Sender::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Every window slot is occupied; retry after an ACK frees one.
    #[error("send window full ({0} packets outstanding)")]
    WindowFull(usize),
}

/// What [`Sender::on_ack`] did with an arriving packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Checksum mismatch; dropped without touching state.
    Corrupted,
    /// The acknowledgement field was not in use.
    NotAnAck,
    /// Acknowledges a sequence number outside the outstanding window.
    Stale(u32),
    /// Acknowledges a packet already marked acknowledged.
    Duplicate(u32),
    /// Marked a new packet acknowledged; `slid` slots were retired.
    Accepted { acknum: u32, slid: usize },
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Sender-side counters.  Observability only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// First transmissions.
    pub packets_sent: u64,
    /// Messages rejected because the window was full.
    pub window_full: u64,
    /// Uncorrupted ACKs that referenced an outstanding packet.
    pub acks_received: u64,
    /// ACKs that marked a packet for the first time.
    pub new_acks: u64,
    pub corrupted_acks: u64,
    pub stale_acks: u64,
    pub packets_resent: u64,
    pub timeouts: u64,
}

// ---------------------------------------------------------------------------
// SendSlot
// ---------------------------------------------------------------------------

/// One occupied slot of the send window.
#[derive(Debug, Clone)]
struct SendSlot {
    packet: Packet,
    acked: bool,
    /// Total number of times this packet has been transmitted.
    tx_count: u32,
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Selective-Repeat send-side state for one session.
#[derive(Debug)]
pub struct Sender {
    space: SeqSpace,
    timeout: f64,
    policy: RetransmitPolicy,

    /// Oldest unacknowledged sequence number (left window edge).
    base: u32,
    /// Sequence number for the next new packet.
    next_seq: u32,
    /// Slot index holding `base`.
    window_first: usize,
    /// Occupied slots, `0..=window_size`.
    window_count: usize,
    slots: Vec<Option<SendSlot>>,

    stats: SenderStats,
}

impl Sender {
    pub fn new(config: &Config) -> Self {
        Self {
            space: config.seq_space(),
            timeout: config.timeout(),
            policy: config.policy(),
            base: 0,
            next_seq: 0,
            window_first: 0,
            window_count: 0,
            slots: vec![None; config.window_size()],
            stats: SenderStats::default(),
        }
    }

    /// Return to the initial state: empty window, sequence numbers at zero.
    ///
    /// The timer facility is not touched; it is assumed idle at session start.
    /// Counters are kept.
    pub fn reset(&mut self) {
        self.base = 0;
        self.next_seq = 0;
        self.window_first = 0;
        self.window_count = 0;
        self.slots.iter_mut().for_each(|s| *s = None);
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Accept one message from the application and transmit it.
    ///
    /// Returns the sequence number assigned to the packet.
    pub fn submit<E>(&mut self, message: Message, env: &mut E) -> Result<u32, SubmitError>
    where
        E: Channel + TimerControl,
    {
        if self.window_count == self.window_size() {
            self.stats.window_full += 1;
            log::debug!(
                "[sr:A] window full ({} outstanding); message rejected",
                self.window_count
            );
            return Err(SubmitError::WindowFull(self.window_count));
        }

        let seq = self.next_seq;
        let packet = Packet::data(seq, message.data);
        let idx = self.slot_index(self.window_count);
        self.slots[idx] = Some(SendSlot {
            packet,
            acked: false,
            tx_count: 1,
        });

        log::debug!(
            "[sr:A] → DATA seq={} in_flight={}",
            seq,
            self.window_count + 1
        );
        env.send_packet(Side::Sender, packet);
        self.stats.packets_sent += 1;

        self.window_count += 1;
        self.next_seq = self.space.next(self.next_seq);
        if self.window_count == 1 {
            env.start_timer(Side::Sender, self.timeout);
        }
        Ok(seq)
    }

    /// Process a packet arriving on the reverse (ACK) channel.
    pub fn on_ack<E>(&mut self, packet: &Packet, env: &mut E) -> AckOutcome
    where
        E: Channel + TimerControl,
    {
        if packet.is_corrupted() {
            self.stats.corrupted_acks += 1;
            log::debug!("[sr:A] ← corrupted ACK dropped");
            return AckOutcome::Corrupted;
        }
        let Some(acknum) = packet.ack_num() else {
            self.stats.stale_acks += 1;
            log::debug!("[sr:A] ← packet without ACK number ignored");
            return AckOutcome::NotAnAck;
        };
        let Some(offset) = self.offset_of(acknum) else {
            self.stats.stale_acks += 1;
            log::debug!(
                "[sr:A] ← ACK {} outside window [{}, +{}); ignored",
                acknum,
                self.base,
                self.window_count
            );
            return AckOutcome::Stale(acknum);
        };

        self.stats.acks_received += 1;
        let idx = self.slot_index(offset);
        let fresh = match self.slots[idx].as_mut() {
            Some(slot) if !slot.acked => {
                slot.acked = true;
                true
            }
            _ => false,
        };
        if fresh {
            self.stats.new_acks += 1;
            log::debug!("[sr:A] ← ACK {} marked", acknum);
        } else {
            log::debug!("[sr:A] ← duplicate ACK {}", acknum);
        }

        let slid = self.slide();

        if self.window_count == 0 {
            env.stop_timer(Side::Sender);
        } else {
            env.start_timer(Side::Sender, self.timeout);
        }

        if fresh {
            AckOutcome::Accepted { acknum, slid }
        } else {
            AckOutcome::Duplicate(acknum)
        }
    }

    /// Handle expiry of the sender's timer.
    ///
    /// Retransmits according to the configured [`RetransmitPolicy`] and
    /// restarts the timer.  Returns the number of packets resent.
    pub fn on_timeout<E>(&mut self, env: &mut E) -> usize
    where
        E: Channel + TimerControl,
    {
        self.stats.timeouts += 1;
        if self.window_count == 0 {
            log::warn!("[sr:A] timeout with empty window; ignored");
            return 0;
        }

        let span = match self.policy {
            RetransmitPolicy::OldestOnly => 1,
            RetransmitPolicy::AllUnacked => self.window_count,
        };
        log::debug!("[sr:A] timeout — retransmitting ({:?})", self.policy);

        let mut resent = 0;
        for offset in 0..span {
            let idx = self.slot_index(offset);
            if let Some(slot) = self.slots[idx].as_mut().filter(|s| !s.acked) {
                slot.tx_count += 1;
                log::debug!(
                    "[sr:A] → RESEND seq={} tx_count={}",
                    slot.packet.seq(),
                    slot.tx_count
                );
                env.send_packet(Side::Sender, slot.packet);
                resent += 1;
            }
        }
        self.stats.packets_resent += resent as u64;
        env.start_timer(Side::Sender, self.timeout);
        resent
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Oldest unacknowledged sequence number.
    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    /// Number of packets currently in the window.
    pub fn window_count(&self) -> usize {
        self.window_count
    }

    pub fn window_size(&self) -> usize {
        self.slots.len()
    }

    /// `true` when nothing is awaiting acknowledgement.
    pub fn is_idle(&self) -> bool {
        self.window_count == 0
    }

    /// `Some(acked)` for an outstanding sequence number, `None` otherwise.
    pub fn is_acked(&self, seq: u32) -> Option<bool> {
        let offset = self.offset_of(seq)?;
        self.slots[self.slot_index(offset)].as_ref().map(|s| s.acked)
    }

    /// Number of times outstanding packet `seq` has been transmitted.
    pub fn tx_count(&self, seq: u32) -> Option<u32> {
        let offset = self.offset_of(seq)?;
        self.slots[self.slot_index(offset)]
            .as_ref()
            .map(|s| s.tx_count)
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    #[inline]
    fn slot_index(&self, offset: usize) -> usize {
        (self.window_first + offset) % self.window_size()
    }

    /// Offset of `seq` from `base` when it is outstanding.
    fn offset_of(&self, seq: u32) -> Option<usize> {
        if !self.space.in_window(self.base, self.window_count as u32, seq) {
            return None;
        }
        Some(self.space.distance(self.base, seq) as usize)
    }

    /// Retire acknowledged slots from the front of the window.
    fn slide(&mut self) -> usize {
        let mut slid = 0;
        while self.window_count > 0 {
            let front = self.window_first;
            match &self.slots[front] {
                Some(slot) if slot.acked => {
                    debug_assert_eq!(slot.packet.seq(), self.base);
                    self.slots[front] = None;
                    self.window_first = (front + 1) % self.window_size();
                    self.base = self.space.next(self.base);
                    self.window_count -= 1;
                    slid += 1;
                }
                _ => break,
            }
        }
        if slid > 0 {
            log::debug!(
                "[sr:A] window slid {} → base={} in_flight={}",
                slid,
                self.base,
                self.window_count
            );
        }
        slid
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
