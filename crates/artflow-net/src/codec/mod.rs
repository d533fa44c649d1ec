//! Art-Net wire codec
//!
//! Every Art-Net packet starts with the 8-byte id `"Art-Net\0"` followed by
//! a little-endian opcode. This module handles the three packet kinds the
//! engine speaks:
//!
//! | Packet       | Opcode | Direction                         |
//! |--------------|--------|-----------------------------------|
//! | ArtPoll      | 0x2000 | discovery request (broadcast)     |
//! | ArtPollReply | 0x2100 | node self-description (broadcast) |
//! | ArtDmx       | 0x5000 | one universe of DMX512 data       |
//!
//! Payload integers are little-endian, except the fields Art-Net defines as
//! `Hi`/`Lo` pairs (protocol version, firmware, OEM, port count) which are
//! read little-endian and byte-swapped, and IPv4 addresses which are read as
//! a little-endian `u32` and byte-swapped. The ArtDmx length is big-endian.
//!
//! Anything that does not start with the Art-Net id is foreign traffic and
//! decodes to [`ArtNetError::MalformedPacket`]; callers drop it silently.

pub mod dmx;
pub mod poll;
pub mod poll_reply;
pub(crate) mod reader;

pub use dmx::{encode_dmx, ArtDmx};
pub use poll::{encode_poll, ArtPoll};
pub use poll_reply::{encode_poll_reply, ArtPollReply, NodeStyle};

use crate::{error::ArtNetError, Result};
use reader::PacketReader;

/// UDP port used by every Art-Net node
pub const ARTNET_PORT: u16 = 6454;

/// Packet id shared by all Art-Net packets
pub const ARTNET_HEADER: &[u8; 8] = b"Art-Net\0";

/// Art-Net protocol revision implemented here
pub const PROTOCOL_VERSION: u16 = 14;

/// Channels in one DMX512 universe
pub const DMX_UNIVERSE_SIZE: usize = 512;

/// Length of id + opcode
pub(crate) const HEADER_LEN: usize = 10;

/// Opcodes the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum OpCode {
    Poll = 0x2000,
    PollReply = 0x2100,
    Dmx = 0x5000,
}

impl OpCode {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x2000 => Some(OpCode::Poll),
            0x2100 => Some(OpCode::PollReply),
            0x5000 => Some(OpCode::Dmx),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OpCode::Poll => "ArtPoll",
            OpCode::PollReply => "ArtPollReply",
            OpCode::Dmx => "ArtDmx",
        }
    }
}

/// A decoded Art-Net packet
#[derive(Debug, Clone, PartialEq)]
pub enum ArtPacket {
    Poll(ArtPoll),
    PollReply(Box<ArtPollReply>),
    Dmx(ArtDmx),
}

impl ArtPacket {
    pub fn opcode(&self) -> OpCode {
        match self {
            ArtPacket::Poll(_) => OpCode::Poll,
            ArtPacket::PollReply(_) => OpCode::PollReply,
            ArtPacket::Dmx(_) => OpCode::Dmx,
        }
    }

    /// Encode back to wire bytes
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ArtPacket::Poll(poll) => poll.encode(),
            ArtPacket::PollReply(reply) => reply.encode(),
            ArtPacket::Dmx(dmx) => dmx.encode(),
        }
    }
}

/// Decode one datagram.
///
/// # Errors
/// * [`ArtNetError::MalformedPacket`] - not an Art-Net datagram
/// * [`ArtNetError::TruncatedPacket`] - mandatory fields missing
/// * [`ArtNetError::UnsupportedOpcode`] - Art-Net, but not a packet we handle
pub fn decode(buf: &[u8]) -> Result<ArtPacket> {
    let mut reader = PacketReader::new(buf);
    match reader.bytes::<8>() {
        Some(id) if &id == ARTNET_HEADER => {}
        _ => {
            return Err(ArtNetError::MalformedPacket(
                "missing Art-Net header".to_string(),
            ))
        }
    }

    let raw_opcode = reader.u16_le().ok_or(ArtNetError::TruncatedPacket {
        kind: "Art-Net",
        len: buf.len(),
        needed: HEADER_LEN,
    })?;

    match OpCode::from_u16(raw_opcode) {
        Some(OpCode::Poll) => ArtPoll::decode(buf).map(ArtPacket::Poll),
        Some(OpCode::PollReply) => {
            ArtPollReply::decode(buf).map(|reply| ArtPacket::PollReply(Box::new(reply)))
        }
        Some(OpCode::Dmx) => ArtDmx::decode(buf).map(ArtPacket::Dmx),
        None => Err(ArtNetError::UnsupportedOpcode(raw_opcode)),
    }
}

/// Start a packet with the Art-Net id and opcode
pub(crate) fn packet_with_header(opcode: OpCode, capacity: usize) -> Vec<u8> {
    let mut packet = Vec::with_capacity(capacity);
    packet.extend_from_slice(ARTNET_HEADER);
    packet.extend_from_slice(&(opcode as u16).to_le_bytes());
    packet
}
