//! Selective-Repeat receive-side state machine.
//!
//! [`Receiver`] implements the receiver side of Selective Repeat:
//!
//! - Packets whose sequence number lies in `[expected, expected + W)` (modulo
//!   the sequence space) are **buffered**, even when they arrive out of order.
//! - Every uncorrupted packet is acknowledged individually with
//!   `acknum = seq`, including duplicates and packets outside the window, so a
//!   sender that lost an earlier ACK can still slide.
//! - Corrupted packets are dropped silently; the sender's timeout recovers them.
//! - After buffering, the contiguous run starting at `expected` is delivered to
//!   the application in order and the window advances past it.

use crate::config::Config;
use crate::env::{Application, Channel, Side};
use crate::packet::{Packet, Payload};
use crate::seq_space::SeqSpace;

/// What [`Receiver::on_packet`] did with an arriving packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// Checksum mismatch; dropped without an ACK.
    Corrupted,
    /// Newly buffered; `delivered` payloads were handed to the application.
    Buffered { seq: u32, delivered: usize },
    /// Already buffered; re-acknowledged only.
    Duplicate(u32),
    /// Outside the receive window; re-acknowledged only.
    OutOfWindow(u32),
    /// Sequence number outside the sequence space; dropped without an ACK.
    Malformed(u32),
}

/// Receiver-side counters.  Observability only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Packets newly accepted into the buffer.
    pub packets_received: u64,
    pub duplicates: u64,
    pub out_of_window: u64,
    pub corrupted: u64,
    /// Intact packets whose sequence number no sender could have used.
    pub malformed: u64,
    pub acks_sent: u64,
    /// Payloads handed to the application.
    pub delivered: u64,
}

/// Selective-Repeat receive-side state for one session.
#[derive(Debug)]
pub struct Receiver {
    space: SeqSpace,
    window_size: u32,

    /// Lowest sequence number not yet delivered.
    expected: u32,
    /// One slot per sequence number; `Some` when received but not delivered.
    buffer: Vec<Option<Payload>>,

    stats: ReceiverStats,
}

impl Receiver {
    pub fn new(config: &Config) -> Self {
        let space = config.seq_space();
        Self {
            space,
            window_size: config.window_size() as u32,
            expected: 0,
            buffer: vec![None; space.size() as usize],
            stats: ReceiverStats::default(),
        }
    }

    /// Return to the initial state.  Counters are kept.
    pub fn reset(&mut self) {
        self.expected = 0;
        self.buffer.iter_mut().for_each(|s| *s = None);
    }

    /// Process a data packet arriving from the channel.
    pub fn on_packet<E>(&mut self, packet: &Packet, env: &mut E) -> Arrival
    where
        E: Channel + Application,
    {
        if packet.is_corrupted() {
            self.stats.corrupted += 1;
            log::debug!("[sr:B] ← corrupted packet dropped; no ACK");
            return Arrival::Corrupted;
        }

        let seq = packet.seq();
        if !self.space.contains(seq) {
            self.stats.malformed += 1;
            log::warn!(
                "[sr:B] ← DATA seq={} outside sequence space {}; dropped",
                seq,
                self.space.size()
            );
            return Arrival::Malformed(seq);
        }

        if !self.space.in_window(self.expected, self.window_size, seq) {
            self.stats.out_of_window += 1;
            log::debug!(
                "[sr:B] ← DATA seq={} outside window [{}, +{}); re-ACK only",
                seq,
                self.expected,
                self.window_size
            );
            self.send_ack(seq, env);
            return Arrival::OutOfWindow(seq);
        }

        let slot = &mut self.buffer[seq as usize];
        let fresh = slot.is_none();
        if fresh {
            *slot = Some(*packet.payload());
            self.stats.packets_received += 1;
            log::debug!("[sr:B] ← DATA seq={} buffered", seq);
        } else {
            self.stats.duplicates += 1;
            log::debug!("[sr:B] ← DATA seq={} duplicate", seq);
        }
        self.send_ack(seq, env);

        let delivered = self.drain(env);
        if fresh {
            Arrival::Buffered { seq, delivered }
        } else {
            Arrival::Duplicate(seq)
        }
    }

    /// Lowest sequence number not yet delivered.
    pub fn expected(&self) -> u32 {
        self.expected
    }

    /// `true` when `seq` has been buffered and awaits delivery.
    pub fn is_buffered(&self, seq: u32) -> bool {
        self.buffer
            .get(seq as usize)
            .is_some_and(|slot| slot.is_some())
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    fn send_ack<E: Channel>(&mut self, seq: u32, env: &mut E) {
        env.send_packet(Side::Receiver, Packet::ack(seq));
        self.stats.acks_sent += 1;
        log::debug!("[sr:B] → ACK {}", seq);
    }

    /// Deliver the contiguous run starting at `expected`.
    fn drain<E: Application>(&mut self, env: &mut E) -> usize {
        let mut delivered = 0;
        while let Some(payload) = self.buffer[self.expected as usize].take() {
            env.deliver(Side::Receiver, &payload);
            self.expected = self.space.next(self.expected);
            delivered += 1;
        }
        if delivered > 0 {
            self.stats.delivered += delivered as u64;
            log::debug!(
                "[sr:B] delivered {} → expected={}",
                delivered,
                self.expected
            );
        }
        delivered
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PAYLOAD_SIZE;

    #[derive(Default)]
    struct Recorder {
        acks: Vec<u32>,
        delivered: Vec<Payload>,
    }

    impl Channel for Recorder {
        fn send_packet(&mut self, from: Side, packet: Packet) {
            assert_eq!(from, Side::Receiver);
            assert!(!packet.is_corrupted());
            self.acks.push(packet.ack_num().expect("receiver only sends ACKs"));
        }
    }

    impl Application for Recorder {
        fn deliver(&mut self, side: Side, payload: &Payload) {
            assert_eq!(side, Side::Receiver);
            self.delivered.push(*payload);
        }
    }

    fn data(seq: u32) -> Packet {
        Packet::data(seq, [seq as u8; PAYLOAD_SIZE])
    }

    fn receiver(window: usize, space: u32) -> Receiver {
        Receiver::new(&Config::new(window, space, 16.0).unwrap())
    }

    fn delivered_tags(env: &Recorder) -> Vec<u8> {
        env.delivered.iter().map(|p| p[0]).collect()
    }

    #[test]
    fn in_order_packet_delivered_immediately() {
        let mut r = receiver(4, 8);
        let mut env = Recorder::default();
        assert_eq!(
            r.on_packet(&data(0), &mut env),
            Arrival::Buffered { seq: 0, delivered: 1 }
        );
        assert_eq!(r.expected(), 1);
        assert_eq!(env.acks, vec![0]);
        assert_eq!(delivered_tags(&env), vec![0]);
    }

    #[test]
    fn out_of_order_packets_buffered_until_gap_fills() {
        let mut r = receiver(4, 8);
        let mut env = Recorder::default();
        r.on_packet(&data(2), &mut env);
        r.on_packet(&data(1), &mut env);
        assert!(env.delivered.is_empty());
        assert!(r.is_buffered(1) && r.is_buffered(2));

        assert_eq!(
            r.on_packet(&data(0), &mut env),
            Arrival::Buffered { seq: 0, delivered: 3 }
        );
        assert_eq!(delivered_tags(&env), vec![0, 1, 2]);
        assert_eq!(env.acks, vec![2, 1, 0]);
        assert_eq!(r.expected(), 3);
        assert!(!r.is_buffered(2));
    }

    #[test]
    fn duplicate_is_acked_but_delivered_once() {
        let mut r = receiver(4, 8);
        let mut env = Recorder::default();
        r.on_packet(&data(1), &mut env);
        assert_eq!(r.on_packet(&data(1), &mut env), Arrival::Duplicate(1));
        r.on_packet(&data(0), &mut env);
        assert_eq!(env.acks, vec![1, 1, 0]);
        assert_eq!(delivered_tags(&env), vec![0, 1]);
        assert_eq!(r.stats().duplicates, 1);
    }

    #[test]
    fn already_delivered_packet_is_out_of_window() {
        let mut r = receiver(4, 8);
        let mut env = Recorder::default();
        r.on_packet(&data(0), &mut env);
        assert_eq!(r.on_packet(&data(0), &mut env), Arrival::OutOfWindow(0));
        assert_eq!(env.acks, vec![0, 0]);
        assert_eq!(env.delivered.len(), 1);
    }

    #[test]
    fn too_far_ahead_is_not_buffered() {
        let mut r = receiver(4, 8);
        let mut env = Recorder::default();
        assert_eq!(r.on_packet(&data(4), &mut env), Arrival::OutOfWindow(4));
        assert!(!r.is_buffered(4));
        assert_eq!(env.acks, vec![4]);
    }

    #[test]
    fn corrupted_packet_gets_no_ack() {
        let mut r = receiver(4, 8);
        let mut env = Recorder::default();
        let mut bytes = data(0).encode();
        bytes[20] ^= 0x40;
        let damaged = Packet::decode(&bytes).unwrap();

        assert_eq!(r.on_packet(&damaged, &mut env), Arrival::Corrupted);
        assert!(env.acks.is_empty());
        assert!(env.delivered.is_empty());
        assert_eq!(r.expected(), 0);
        assert!(!r.is_buffered(0));
    }

    #[test]
    fn sequence_number_outside_space_is_dropped_without_ack() {
        let mut r = receiver(4, 8);
        let mut env = Recorder::default();
        r.on_packet(&data(0), &mut env);

        // all ones would alias the unused-ACK wire value if echoed
        for seq in [u32::MAX, 8, 1000] {
            let pkt = Packet::data(seq, [1; PAYLOAD_SIZE]);
            assert!(!pkt.is_corrupted());
            assert_eq!(r.on_packet(&pkt, &mut env), Arrival::Malformed(seq));
        }
        assert_eq!(env.acks, vec![0]);
        assert_eq!(env.delivered.len(), 1);
        assert_eq!(r.expected(), 1);
        assert_eq!(r.stats().malformed, 3);
        assert_eq!(r.stats().out_of_window, 0);

        // the session carries on normally
        r.on_packet(&data(1), &mut env);
        assert_eq!(env.acks, vec![0, 1]);
        assert_eq!(r.expected(), 2);
    }

    #[test]
    fn window_wraps_around_sequence_space() {
        let mut r = receiver(2, 4);
        let mut env = Recorder::default();
        for seq in [0, 1, 2, 3, 0, 1] {
            r.on_packet(&data(seq), &mut env);
        }
        assert_eq!(r.expected(), 2);
        assert_eq!(env.delivered.len(), 6);
        // second generation: 3 arrives ahead of 2
        r.on_packet(&data(3), &mut env);
        assert!(r.is_buffered(3));
        r.on_packet(&data(2), &mut env);
        assert_eq!(r.expected(), 0);
        assert_eq!(delivered_tags(&env), vec![0, 1, 2, 3, 0, 1, 2, 3]);
    }

    #[test]
    fn reset_forgets_buffered_packets() {
        let mut r = receiver(4, 8);
        let mut env = Recorder::default();
        r.on_packet(&data(0), &mut env);
        r.on_packet(&data(2), &mut env);
        r.reset();
        assert_eq!(r.expected(), 0);
        assert!(!r.is_buffered(2));
    }
}
