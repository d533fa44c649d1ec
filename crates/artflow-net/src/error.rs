//! Error types for the Art-Net engine
use thiserror::Error;

use crate::port_address::PortAddress;

/// Art-Net engine errors
#[derive(Error, Debug)]
pub enum ArtNetError {
    /// Datagram does not carry the `Art-Net\0` header
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    /// Art-Net datagram shorter than the mandatory part of its packet kind
    #[error("Truncated {kind} packet: {len} bytes, need at least {needed}")]
    TruncatedPacket {
        kind: &'static str,
        len: usize,
        needed: usize,
    },

    /// Well-formed Art-Net datagram with an opcode the engine does not handle
    #[error("Unsupported opcode: {0:#06x}")]
    UnsupportedOpcode(u16),

    /// Port-address out of range or unparsable
    #[error("Invalid port-address: {0}")]
    InvalidPortAddress(String),

    /// `set_dmx` on an address without a local input port
    #[error("Not a publisher of universe {0}")]
    NotAPublisher(PortAddress),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Config serialize error: {0}")]
    ConfigSerializeError(#[from] toml::ser::Error),
}

impl ArtNetError {
    /// True for errors that only mean "this datagram is not for us".
    ///
    /// Foreign traffic is normal on a broadcast medium and is dropped without
    /// being reported.
    pub fn is_foreign_traffic(&self) -> bool {
        matches!(self, ArtNetError::MalformedPacket(_))
    }
}

/// Result type for Art-Net operations
pub type Result<T> = std::result::Result<T, ArtNetError>;
