//! `sr-arq` — a Selective-Repeat ARQ engine for reliable, in-order message
//! delivery over a channel that loses, corrupts and delays packets.
//!
//! # Architecture
//!
//! ```text
//!  application            application
//!      │ submit                ▲ deliver
//!  ┌───▼──────┐   data    ┌────┴─────┐
//!  │  Sender  │──────────▶│ Receiver │
//!  └────┬─────┘           └────┬─────┘
//!       ▲        ACKs          │
//!       └──────────────────────┘
//!            channel (env::Channel)
//!  timer (env::TimerControl) ──▶ Sender::on_timeout
//! ```
//!
//! Sender and receiver share no state; every interaction crosses the channel.
//! Both are synchronous, single-threaded state machines driven one event at a
//! time by whatever owns the channel and the clock.
//!
//! Each module has a single responsibility:
//! - [`packet`]     — packet and message types, checksum, wire image
//! - [`seq_space`]  — modulo sequence-number arithmetic
//! - [`config`]     — validated window / sequence-space / timeout settings
//! - [`env`]        — collaborator traits the engine calls into
//! - [`sender`]     — send window, individual ACK tracking, retransmission
//! - [`receiver`]   — receive window, out-of-order buffering, in-order delivery
//! - [`timer`]      — single-shot restartable timer used by the emulator
//! - [`simulator`]  — lossy/corrupting discrete-event channel emulator

pub mod config;
pub mod env;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod seq_space;
pub mod simulator;
pub mod timer;

pub use config::{Config, ConfigError, RetransmitPolicy};
pub use env::{Application, Channel, Side, TimerControl};
pub use packet::{Message, Packet, PacketError, Payload, PAYLOAD_SIZE};
pub use receiver::{Arrival, Receiver};
pub use sender::{AckOutcome, Sender, SubmitError};
