//! ArtDmx (OpDmx, 0x5000)
//!
//! One universe of DMX512 data. Header is 18 bytes, followed by up to 512
//! channel values.

use super::reader::PacketReader;
use super::{packet_with_header, OpCode, DMX_UNIVERSE_SIZE, HEADER_LEN, PROTOCOL_VERSION};
use crate::port_address::PortAddress;
use crate::{error::ArtNetError, Result};

/// Header length up to the first data byte
pub const DMX_HEADER_LEN: usize = 18;

/// DMX data frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtDmx {
    pub version: u16,
    /// 1-255, or 0 when the sender does not sequence
    pub sequence: u8,
    /// Physical input port the data came from
    pub physical: u8,
    pub address: PortAddress,
    /// Length field as sent, before truncation
    pub declared_length: u16,
    /// At most 512 bytes
    pub data: Vec<u8>,
}

impl ArtDmx {
    /// Decode from a full datagram (header included).
    ///
    /// The payload is cut to the smaller of the declared length, the bytes
    /// actually present and 512. An oversize length is not an error; a net
    /// byte above 127 is ([`ArtNetError::InvalidPortAddress`]).
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut reader = PacketReader::at(buf, HEADER_LEN);
        let truncated = || ArtNetError::TruncatedPacket {
            kind: OpCode::Dmx.name(),
            len: buf.len(),
            needed: DMX_HEADER_LEN,
        };

        let version = reader.u16_swapped().ok_or_else(truncated)?;
        let sequence = reader.u8().ok_or_else(truncated)?;
        let physical = reader.u8().ok_or_else(truncated)?;
        let sub_uni = reader.u8().ok_or_else(truncated)?;
        let net = reader.u8().ok_or_else(truncated)?;
        let declared_length = reader.u16_be().ok_or_else(truncated)?;
        let address = PortAddress::from_wire(net, sub_uni)?;

        let wanted = (declared_length as usize).min(DMX_UNIVERSE_SIZE);
        let data = reader.take_up_to(wanted).to_vec();

        Ok(Self {
            version,
            sequence,
            physical,
            address,
            declared_length,
            data,
        })
    }

    pub fn new(address: PortAddress, sequence: u8, physical: u8, data: &[u8]) -> Self {
        let data = &data[..data.len().min(DMX_UNIVERSE_SIZE)];
        Self {
            version: PROTOCOL_VERSION,
            sequence,
            physical,
            address,
            declared_length: data.len() as u16,
            data: data.to_vec(),
        }
    }

    /// Build an Art-Net DMX packet (OpDmx)
    ///
    /// Art-Net wants an even length between 2 and 512, so odd or empty
    /// payloads are padded with zeros.
    pub fn encode(&self) -> Vec<u8> {
        let len = self.data.len().min(DMX_UNIVERSE_SIZE);
        let padded_len = (len + (len & 1)).max(2);

        // Header: "Art-Net\0" + OpDmx
        let mut packet = packet_with_header(OpCode::Dmx, DMX_HEADER_LEN + padded_len);

        // Protocol version (Hi/Lo)
        packet.extend_from_slice(&self.version.to_be_bytes());

        packet.push(self.sequence);
        packet.push(self.physical);

        // Port-Address: SubUni then Net
        packet.push(self.address.sub_uni());
        packet.push(self.address.net());

        // Length (big-endian)
        packet.extend_from_slice(&(padded_len as u16).to_be_bytes());

        // DMX data
        packet.extend_from_slice(&self.data[..len]);
        packet.resize(DMX_HEADER_LEN + padded_len, 0);

        packet
    }
}

/// Encode one DMX frame
pub fn encode_dmx(address: PortAddress, sequence: u8, physical: u8, data: &[u8]) -> Vec<u8> {
    ArtDmx::new(address, sequence, physical, data).encode()
}
