//! ArtPollReply (OpPollReply, 0x2100)
//!
//! Layout (offsets from the start of the datagram):
//!
//! ```text
//!   0 id[8]          8 opcode        10 ip[4]         14 port
//!  16 firmware      18 net switch    19 sub switch    20 oem
//!  22 ubea          23 status1       24 esta          26 short name[18]
//!  44 long name[64] 108 report[64]  172 num ports    174 port types[4]
//! 178 good in[4]   182 good out[4]  186 sw in[4]     190 sw out[4]
//! 194 acn prio     195 sw macro     196 sw remote    197 spare[3]
//! 200 style
//! --- optional from here, senders may truncate ---
//! 201 mac[6]       207 bind ip[4]   211 bind index   212 status2
//! 213 good out B[4] 217 status3     218 rdm uid[6]   224 user
//! 226 refresh rate 228 filler[11]   239 end
//! ```

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::reader::{nul_padded_string, write_nul_padded, PacketReader};
use super::{OpCode, ARTNET_HEADER, ARTNET_PORT, HEADER_LEN};
use crate::local::LocalNode;
use crate::node::{Port, PortDirection};
use crate::port_address::PortAddress;
use crate::{error::ArtNetError, Result};

/// Full length of an Art-Net 4 ArtPollReply
pub const POLL_REPLY_LEN: usize = 239;

/// Bytes up to and including the style code
pub const POLL_REPLY_MANDATORY_LEN: usize = 201;

pub const SHORT_NAME_LEN: usize = 18;
pub const LONG_NAME_LEN: usize = 64;
pub const NODE_REPORT_LEN: usize = 64;

/// Ports described by one reply (one bind page)
pub const PORTS_PER_PAGE: usize = 4;

/// PortTypes bit: port can output DMX from the network
pub const PORT_TYPE_OUTPUT: u8 = 0x80;
/// PortTypes bit: port can input DMX onto the network
pub const PORT_TYPE_INPUT: u8 = 0x40;
/// PortTypes bits 0-5: protocol / media type
pub const PORT_TYPE_MEDIA_MASK: u8 = 0x3F;

/// GoodOutputA bit: data is being transmitted
const GOOD_OUTPUT_TRANSMITTING: u8 = 0x80;

/// Status1: indicators normal, port-address set from front panel
const STATUS1_DEFAULT: u8 = 0xD0;
/// Status2: 15-bit port-address supported
const STATUS2_PORT_ADDRESS_15BIT: u8 = 0x08;

/// Equipment style code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NodeStyle {
    /// DMX to/from Art-Net device
    #[default]
    Node,
    /// Lighting console
    Controller,
    /// Media server
    Media,
    /// Network routing device
    Route,
    /// Backup device
    Backup,
    /// Configuration or diagnostic tool
    Config,
    /// Visualiser
    Visual,
    /// Any code not listed above
    Other(u8),
}

impl NodeStyle {
    pub fn from_u8(code: u8) -> Self {
        match code {
            0x00 => NodeStyle::Node,
            0x01 => NodeStyle::Controller,
            0x02 => NodeStyle::Media,
            0x03 => NodeStyle::Route,
            0x04 => NodeStyle::Backup,
            0x05 => NodeStyle::Config,
            0x06 => NodeStyle::Visual,
            other => NodeStyle::Other(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            NodeStyle::Node => 0x00,
            NodeStyle::Controller => 0x01,
            NodeStyle::Media => 0x02,
            NodeStyle::Route => 0x03,
            NodeStyle::Backup => 0x04,
            NodeStyle::Config => 0x05,
            NodeStyle::Visual => 0x06,
            NodeStyle::Other(code) => code,
        }
    }
}

impl fmt::Display for NodeStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStyle::Node => write!(f, "StNode"),
            NodeStyle::Controller => write!(f, "StController"),
            NodeStyle::Media => write!(f, "StMedia"),
            NodeStyle::Route => write!(f, "StRoute"),
            NodeStyle::Backup => write!(f, "StBackup"),
            NodeStyle::Config => write!(f, "StConfig"),
            NodeStyle::Visual => write!(f, "StVisual"),
            NodeStyle::Other(code) => write!(f, "St({:#04x})", code),
        }
    }
}

/// Node self-description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtPollReply {
    pub ip: Ipv4Addr,
    pub port: u16,
    pub firmware: u16,
    pub net_switch: u8,
    pub sub_switch: u8,
    pub oem: u16,
    pub ubea_version: u8,
    pub status1: u8,
    pub esta_code: u16,
    pub short_name: String,
    pub long_name: String,
    pub node_report: String,
    pub num_ports: u16,
    pub port_types: [u8; 4],
    pub good_input: [u8; 4],
    pub good_output_a: [u8; 4],
    pub sw_in: [u8; 4],
    pub sw_out: [u8; 4],
    pub acn_priority: u8,
    pub sw_macro: u8,
    pub sw_remote: u8,
    pub style: NodeStyle,

    // Optional trailer
    pub mac: [u8; 6],
    pub bind_ip: Ipv4Addr,
    pub bind_index: u8,
    pub status2: u8,
    pub good_output_b: [u8; 4],
    pub status3: u8,
    pub default_responder: [u8; 6],
    pub user: u16,
    pub refresh_rate: u16,
}

impl Default for ArtPollReply {
    fn default() -> Self {
        Self {
            ip: Ipv4Addr::UNSPECIFIED,
            port: ARTNET_PORT,
            firmware: 0,
            net_switch: 0,
            sub_switch: 0,
            oem: 0,
            ubea_version: 0,
            status1: 0,
            esta_code: 0,
            short_name: String::new(),
            long_name: String::new(),
            node_report: String::new(),
            num_ports: 0,
            port_types: [0; 4],
            good_input: [0; 4],
            good_output_a: [0; 4],
            sw_in: [0; 4],
            sw_out: [0; 4],
            acn_priority: 0,
            sw_macro: 0,
            sw_remote: 0,
            style: NodeStyle::Node,
            mac: [0; 6],
            bind_ip: Ipv4Addr::UNSPECIFIED,
            bind_index: 0,
            status2: 0,
            good_output_b: [0; 4],
            status3: 0,
            default_responder: [0; 6],
            user: 0,
            refresh_rate: 0,
        }
    }
}

impl ArtPollReply {
    /// Decode from a full datagram (header included).
    ///
    /// Fields up to the style code are mandatory; everything after it
    /// defaults to zero when the sender truncated the packet.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < POLL_REPLY_MANDATORY_LEN {
            return Err(ArtNetError::TruncatedPacket {
                kind: OpCode::PollReply.name(),
                len: buf.len(),
                needed: POLL_REPLY_MANDATORY_LEN,
            });
        }

        let mut r = PacketReader::at(buf, HEADER_LEN);
        let truncated = || ArtNetError::TruncatedPacket {
            kind: OpCode::PollReply.name(),
            len: buf.len(),
            needed: POLL_REPLY_MANDATORY_LEN,
        };

        let ip = Ipv4Addr::from(r.u32_swapped().ok_or_else(truncated)?);
        let port = r.u16_le().ok_or_else(truncated)?;
        let firmware = r.u16_swapped().ok_or_else(truncated)?;
        let net_switch = r.u8().ok_or_else(truncated)?;
        let sub_switch = r.u8().ok_or_else(truncated)?;
        let oem = r.u16_swapped().ok_or_else(truncated)?;
        let ubea_version = r.u8().ok_or_else(truncated)?;
        let status1 = r.u8().ok_or_else(truncated)?;
        let esta_code = r.u16_le().ok_or_else(truncated)?;
        let short_name = r.bytes::<SHORT_NAME_LEN>().ok_or_else(truncated)?;
        let long_name = r.bytes::<LONG_NAME_LEN>().ok_or_else(truncated)?;
        let node_report = r.bytes::<NODE_REPORT_LEN>().ok_or_else(truncated)?;
        let num_ports = r.u16_swapped().ok_or_else(truncated)?;
        let port_types = r.bytes::<4>().ok_or_else(truncated)?;
        let good_input = r.bytes::<4>().ok_or_else(truncated)?;
        let good_output_a = r.bytes::<4>().ok_or_else(truncated)?;
        let sw_in = r.bytes::<4>().ok_or_else(truncated)?;
        let sw_out = r.bytes::<4>().ok_or_else(truncated)?;
        let acn_priority = r.u8().ok_or_else(truncated)?;
        let sw_macro = r.u8().ok_or_else(truncated)?;
        let sw_remote = r.u8().ok_or_else(truncated)?;
        r.skip(3).ok_or_else(truncated)?;
        let style = NodeStyle::from_u8(r.u8().ok_or_else(truncated)?);
        debug_assert_eq!(r.position(), POLL_REPLY_MANDATORY_LEN);

        Ok(Self {
            ip,
            port,
            firmware,
            net_switch,
            sub_switch,
            oem,
            ubea_version,
            status1,
            esta_code,
            short_name: nul_padded_string(&short_name),
            long_name: nul_padded_string(&long_name),
            node_report: nul_padded_string(&node_report),
            num_ports,
            port_types,
            good_input,
            good_output_a,
            sw_in,
            sw_out,
            acn_priority,
            sw_macro,
            sw_remote,
            style,
            mac: r.bytes::<6>().unwrap_or_default(),
            bind_ip: Ipv4Addr::from(r.u32_swapped().unwrap_or_default()),
            bind_index: r.u8().unwrap_or_default(),
            status2: r.u8().unwrap_or_default(),
            good_output_b: r.bytes::<4>().unwrap_or_default(),
            status3: r.u8().unwrap_or_default(),
            default_responder: r.bytes::<6>().unwrap_or_default(),
            user: r.u16_swapped().unwrap_or_default(),
            refresh_rate: r.u16_swapped().unwrap_or_default(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut packet = vec![0u8; POLL_REPLY_LEN];

        packet[0..8].copy_from_slice(ARTNET_HEADER);
        packet[8..10].copy_from_slice(&(OpCode::PollReply as u16).to_le_bytes());

        // IP goes out in network order
        packet[10..14].copy_from_slice(&self.ip.octets());
        packet[14..16].copy_from_slice(&self.port.to_le_bytes());
        packet[16..18].copy_from_slice(&self.firmware.to_be_bytes());
        packet[18] = self.net_switch;
        packet[19] = self.sub_switch;
        packet[20..22].copy_from_slice(&self.oem.to_be_bytes());
        packet[22] = self.ubea_version;
        packet[23] = self.status1;
        packet[24..26].copy_from_slice(&self.esta_code.to_le_bytes());
        write_nul_padded(&mut packet[26..44], &self.short_name);
        write_nul_padded(&mut packet[44..108], &self.long_name);
        write_nul_padded(&mut packet[108..172], &self.node_report);
        packet[172..174].copy_from_slice(&self.num_ports.to_be_bytes());
        packet[174..178].copy_from_slice(&self.port_types);
        packet[178..182].copy_from_slice(&self.good_input);
        packet[182..186].copy_from_slice(&self.good_output_a);
        packet[186..190].copy_from_slice(&self.sw_in);
        packet[190..194].copy_from_slice(&self.sw_out);
        packet[194] = self.acn_priority;
        packet[195] = self.sw_macro;
        packet[196] = self.sw_remote;
        // 197..200 spare
        packet[200] = self.style.code();

        packet[201..207].copy_from_slice(&self.mac);
        packet[207..211].copy_from_slice(&self.bind_ip.octets());
        packet[211] = self.bind_index;
        packet[212] = self.status2;
        packet[213..217].copy_from_slice(&self.good_output_b);
        packet[217] = self.status3;
        packet[218..224].copy_from_slice(&self.default_responder);
        packet[224..226].copy_from_slice(&self.user.to_be_bytes());
        packet[226..228].copy_from_slice(&self.refresh_rate.to_be_bytes());
        // 228..239 filler

        packet
    }

    /// Bind page this reply describes (0 and 1 both mean the root page)
    pub fn page(&self) -> u8 {
        self.bind_index.max(1)
    }

    /// Ports advertised by this reply.
    ///
    /// Net and sub-net are page-wide; the universe nibble is per port. A
    /// physical port that can both input and output yields two entries.
    ///
    /// # Errors
    /// * [`ArtNetError::InvalidPortAddress`] - net switch above 127
    pub fn advertised_ports(&self) -> Result<Vec<Port>> {
        let mut ports = Vec::new();
        for slot in 0..PORTS_PER_PAGE {
            let port_type = self.port_types[slot];
            let media = port_type & PORT_TYPE_MEDIA_MASK;
            if port_type & PORT_TYPE_INPUT != 0 {
                let address =
                    PortAddress::from_switches(self.net_switch, self.sub_switch, self.sw_in[slot])?;
                ports.push(Port::new(PortDirection::Input, media, address));
            }
            if port_type & PORT_TYPE_OUTPUT != 0 {
                let address =
                    PortAddress::from_switches(self.net_switch, self.sub_switch, self.sw_out[slot])?;
                ports.push(Port::new(PortDirection::Output, media, address));
            }
        }
        Ok(ports)
    }

    /// Describe one bind page of the local node.
    ///
    /// Ports sharing a port-address share a physical slot; at most
    /// [`PORTS_PER_PAGE`] distinct addresses fit, extra ones are ignored.
    pub fn for_local(local: &LocalNode, bind_index: u8, ports: &[Port]) -> Self {
        let mut reply = Self {
            ip: local.ip(),
            port: ARTNET_PORT,
            firmware: local.firmware(),
            oem: local.oem_code(),
            status1: STATUS1_DEFAULT,
            esta_code: local.esta_code(),
            short_name: local.short_name().to_string(),
            long_name: local.long_name().to_string(),
            node_report: local.node_report(),
            style: local.style(),
            mac: local.mac(),
            bind_ip: local.ip(),
            bind_index,
            status2: STATUS2_PORT_ADDRESS_15BIT,
            ..Default::default()
        };

        if let Some(first) = ports.first() {
            reply.net_switch = first.address.net();
            reply.sub_switch = first.address.sub_net();
        }

        let mut slots: Vec<PortAddress> = Vec::with_capacity(PORTS_PER_PAGE);
        for port in ports {
            let slot = match slots.iter().position(|a| *a == port.address) {
                Some(slot) => slot,
                None if slots.len() < PORTS_PER_PAGE => {
                    slots.push(port.address);
                    slots.len() - 1
                }
                None => continue,
            };

            reply.port_types[slot] |= port.media & PORT_TYPE_MEDIA_MASK;
            match port.direction {
                PortDirection::Input => {
                    reply.port_types[slot] |= PORT_TYPE_INPUT;
                    reply.sw_in[slot] = port.address.universe();
                }
                PortDirection::Output => {
                    reply.port_types[slot] |= PORT_TYPE_OUTPUT;
                    reply.sw_out[slot] = port.address.universe();
                    reply.good_output_a[slot] = GOOD_OUTPUT_TRANSMITTING;
                }
            }
        }
        reply.num_ports = slots.len() as u16;

        reply
    }
}

/// Encode one bind page of the local node
pub fn encode_poll_reply(local: &LocalNode, bind_index: u8, ports: &[Port]) -> Vec<u8> {
    ArtPollReply::for_local(local, bind_index, ports).encode()
}
