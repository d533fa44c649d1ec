//! ArtPoll (OpPoll, 0x2000)

use super::reader::PacketReader;
use super::{packet_with_header, OpCode, HEADER_LEN, PROTOCOL_VERSION};
use crate::{error::ArtNetError, Result};

/// Talk-to-me flags: send ArtPollReply on change (bit 1), diagnostics (bit 2)
pub const DEFAULT_POLL_FLAGS: u8 = 0x06;

/// DpLow diagnostics priority
pub const DEFAULT_DIAG_PRIORITY: u8 = 0x10;

/// Discovery request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtPoll {
    pub version: u16,
    pub flags: u8,
    pub diag_priority: u8,
}

impl Default for ArtPoll {
    fn default() -> Self {
        Self {
            version: PROTOCOL_VERSION,
            flags: DEFAULT_POLL_FLAGS,
            diag_priority: DEFAULT_DIAG_PRIORITY,
        }
    }
}

impl ArtPoll {
    /// Decode from a full datagram (header included)
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut reader = PacketReader::at(buf, HEADER_LEN);
        let truncated = || ArtNetError::TruncatedPacket {
            kind: OpCode::Poll.name(),
            len: buf.len(),
            needed: HEADER_LEN + 3,
        };

        let version = reader.u16_swapped().ok_or_else(truncated)?;
        let flags = reader.u8().ok_or_else(truncated)?;
        // Pre Art-Net 3 controllers omit the priority byte
        let diag_priority = reader.u8().unwrap_or_default();

        Ok(Self {
            version,
            flags,
            diag_priority,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut packet = packet_with_header(OpCode::Poll, HEADER_LEN + 4);
        packet.extend_from_slice(&self.version.to_be_bytes());
        packet.push(self.flags);
        packet.push(self.diag_priority);
        packet
    }
}

/// The poll broadcast by the poll timer
pub fn encode_poll() -> Vec<u8> {
    ArtPoll::default().encode()
}
