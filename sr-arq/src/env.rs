//! Collaborator interfaces the engine calls out to.
//!
//! The state machines in [`crate::sender`] and [`crate::receiver`] never own
//! a channel, a clock or an application.  Each entry point takes the
//! surrounding environment as a `&mut` argument implementing the traits below,
//! so the same engine runs under the [`crate::simulator`] and under the
//! recording mocks used in tests.

use crate::packet::{Packet, Payload};

/// Which end of the link an operation concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Data-sending side (A).
    Sender,
    /// Data-receiving side (B); only ever emits ACKs.
    Receiver,
}

impl Side {
    /// Short tag used in log lines.
    pub fn tag(self) -> &'static str {
        match self {
            Side::Sender => "A",
            Side::Receiver => "B",
        }
    }

    /// The side at the other end of the link.
    pub fn peer(self) -> Side {
        match self {
            Side::Sender => Side::Receiver,
            Side::Receiver => Side::Sender,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// The unreliable medium.  Fire-and-forget.
pub trait Channel {
    fn send_packet(&mut self, from: Side, packet: Packet);
}

/// One single-shot timer per side.
///
/// Starting a timer that is already running restarts it.  A started timer
/// fires exactly once unless stopped first.
pub trait TimerControl {
    fn start_timer(&mut self, side: Side, interval: f64);
    fn stop_timer(&mut self, side: Side);
}

/// Application-layer delivery sink.
pub trait Application {
    /// Called once per payload, in sequence order, without duplicates.
    fn deliver(&mut self, side: Side, payload: &Payload);
}
