//! Wire-format definitions for data and acknowledgement packets.
//!
//! Every unit exchanged between the two sides is a [`Packet`].  This module is
//! responsible for:
//! - Computing the integrity checksum over header fields and payload.
//! - Detecting corruption by recomputing that checksum.
//! - Serialising a [`Packet`] into its fixed-size wire image and parsing it
//!   back, so the channel emulator can damage real bytes.
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |            Acknowledgment Number (all ones = not in use)      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           Checksum                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                     Payload (20 bytes) ...                    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total size: [`WIRE_LEN`] = 32 bytes.

use thiserror::Error;

/// Fixed number of application bytes carried by every packet.
pub const PAYLOAD_SIZE: usize = 20;

/// Byte length of a serialised packet.
pub const WIRE_LEN: usize = 12 + PAYLOAD_SIZE;

/// Wire value of an acknowledgement field that is not in use (−1).
pub const NOT_IN_USE: u32 = u32::MAX;

/// Filler byte for the payload of pure ACK packets.
const ACK_FILL: u8 = b'0';

// Byte offsets of each field within the wire image.
const OFF_SEQ: usize = 0;
const OFF_ACK: usize = 4;
const OFF_CHECKSUM: usize = 8;
const OFF_PAYLOAD: usize = 12;

/// Application payload carried by one packet.
pub type Payload = [u8; PAYLOAD_SIZE];

/// Application-layer unit handed to the sender and delivered by the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub data: Payload,
}

impl Message {
    pub fn new(data: Payload) -> Self {
        Self { data }
    }

    /// Build a message from up to [`PAYLOAD_SIZE`] bytes, zero-padding the rest.
    ///
    /// Extra bytes beyond [`PAYLOAD_SIZE`] are dropped.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut data = [0u8; PAYLOAD_SIZE];
        let n = bytes.len().min(PAYLOAD_SIZE);
        data[..n].copy_from_slice(&bytes[..n]);
        Self { data }
    }
}

/// A complete protocol packet.
///
/// Packets are immutable once built: the constructors compute the checksum
/// and the fields are only readable.  The one way to obtain a packet whose
/// checksum does not match is to [`decode`](Packet::decode) a damaged wire
/// image, which is exactly what the channel does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    seq: u32,
    ack: Option<u32>,
    checksum: u32,
    payload: Payload,
}

impl Packet {
    /// Build a data packet carrying `payload` under sequence number `seq`.
    pub fn data(seq: u32, payload: Payload) -> Self {
        Self::sealed(seq, None, payload)
    }

    /// Build a pure acknowledgement for sequence number `acknum`.
    pub fn ack(acknum: u32) -> Self {
        debug_assert_ne!(acknum, NOT_IN_USE);
        Self::sealed(0, Some(acknum), [ACK_FILL; PAYLOAD_SIZE])
    }

    fn sealed(seq: u32, ack: Option<u32>, payload: Payload) -> Self {
        Self {
            seq,
            ack,
            checksum: compute_checksum(seq, ack, &payload),
            payload,
        }
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// Acknowledged sequence number, or `None` when the field is not in use.
    pub fn ack_num(&self) -> Option<u32> {
        self.ack
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// `true` iff the stored checksum disagrees with the recomputed one.
    pub fn is_corrupted(&self) -> bool {
        self.checksum != compute_checksum(self.seq, self.ack, &self.payload)
    }

    /// Serialise this packet into its wire image.
    ///
    /// The stored checksum is written as-is; it is not recomputed.
    pub fn encode(&self) -> [u8; WIRE_LEN] {
        let mut buf = [0u8; WIRE_LEN];
        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.seq.to_be_bytes());
        buf[OFF_ACK..OFF_ACK + 4].copy_from_slice(&ack_wire(self.ack).to_be_bytes());
        buf[OFF_CHECKSUM..OFF_CHECKSUM + 4].copy_from_slice(&self.checksum.to_be_bytes());
        buf[OFF_PAYLOAD..].copy_from_slice(&self.payload);
        buf
    }

    /// Parse a [`Packet`] from a raw wire image.
    ///
    /// Returns [`Err`] only when `buf` has the wrong length.  The checksum is
    /// **not** verified here; callers use [`is_corrupted`](Packet::is_corrupted)
    /// so that damaged packets can be dropped silently by the protocol.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < WIRE_LEN {
            return Err(PacketError::BufferTooShort(buf.len()));
        }
        if buf.len() != WIRE_LEN {
            return Err(PacketError::LengthMismatch(buf.len()));
        }

        let seq = read_u32(buf, OFF_SEQ);
        let ack = match read_u32(buf, OFF_ACK) {
            NOT_IN_USE => None,
            n => Some(n),
        };
        let checksum = read_u32(buf, OFF_CHECKSUM);
        let mut payload = [0u8; PAYLOAD_SIZE];
        payload.copy_from_slice(&buf[OFF_PAYLOAD..]);

        Ok(Self {
            seq,
            ack,
            checksum,
            payload,
        })
    }
}

/// Errors that can arise when parsing a raw wire image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PacketError {
    /// Buffer shorter than a full packet.
    #[error("buffer too short to contain a packet ({0} < {} bytes)", WIRE_LEN)]
    BufferTooShort(usize),
    /// Buffer longer than a full packet.
    #[error("buffer length {0} does not match packet length {}", WIRE_LEN)]
    LengthMismatch(usize),
}

/// Compute the integrity checksum of a packet's fields.
///
/// Wrapping 32-bit sum of the sequence number, the wire value of the
/// acknowledgement number and every payload byte.
pub fn compute_checksum(seq: u32, ack: Option<u32>, payload: &Payload) -> u32 {
    payload
        .iter()
        .fold(seq.wrapping_add(ack_wire(ack)), |sum, &b| {
            sum.wrapping_add(u32::from(b))
        })
}

#[inline]
fn ack_wire(ack: Option<u32>) -> u32 {
    ack.unwrap_or(NOT_IN_USE)
}

#[inline]
fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}
