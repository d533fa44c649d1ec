//! Art-Net 15-bit port-address
//!
//! A port-address names one universe on the network:
//!
//! ```text
//!  14      8 7    4 3      0
//! +---------+------+--------+
//! |   net   | sub  | univ.  |
//! +---------+------+--------+
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{error::ArtNetError, Result};

/// Highest valid port-address
pub const MAX_PORT_ADDRESS: u16 = 0x7FFF;

/// A validated 15-bit Art-Net port-address (`net:sub-net:universe`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortAddress(u16);

impl PortAddress {
    /// Build a port-address from its three components.
    ///
    /// # Arguments
    /// * `net` - 0-127
    /// * `sub_net` - 0-15
    /// * `universe` - 0-15
    pub fn new(net: u8, sub_net: u8, universe: u8) -> Result<Self> {
        if net > 0x7F {
            return Err(ArtNetError::InvalidPortAddress(format!(
                "net {} out of range (must be 0-127)",
                net
            )));
        }
        if sub_net > 0x0F {
            return Err(ArtNetError::InvalidPortAddress(format!(
                "sub-net {} out of range (must be 0-15)",
                sub_net
            )));
        }
        if universe > 0x0F {
            return Err(ArtNetError::InvalidPortAddress(format!(
                "universe {} out of range (must be 0-15)",
                universe
            )));
        }
        Ok(Self(
            ((net as u16) << 8) | ((sub_net as u16) << 4) | universe as u16,
        ))
    }

    /// Wrap a raw 15-bit value
    pub fn from_raw(raw: u16) -> Result<Self> {
        if raw > MAX_PORT_ADDRESS {
            return Err(ArtNetError::InvalidPortAddress(format!(
                "{:#06x} exceeds 15 bits (net {} > 127)",
                raw,
                raw >> 8
            )));
        }
        Ok(Self(raw))
    }

    /// Build from the `SubUni`/`Net` byte pair carried by ArtDmx.
    /// A net byte above 127 is an error.
    pub(crate) fn from_wire(net: u8, sub_uni: u8) -> Result<Self> {
        Self::from_raw(((net as u16) << 8) | sub_uni as u16)
    }

    /// Build from ArtPollReply switches: page-wide net and sub-net, per-port
    /// universe nibble. Only the low nibble of the sub-net and universe
    /// switches is defined; a net switch above 127 is an error.
    pub(crate) fn from_switches(net_switch: u8, sub_switch: u8, sw: u8) -> Result<Self> {
        Self::from_raw(
            ((net_switch as u16) << 8) | (((sub_switch & 0x0F) as u16) << 4) | (sw & 0x0F) as u16,
        )
    }

    /// Raw 15-bit value
    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn net(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn sub_net(self) -> u8 {
        ((self.0 >> 4) & 0x0F) as u8
    }

    pub fn universe(self) -> u8 {
        (self.0 & 0x0F) as u8
    }

    /// Low byte of the address (`sub-net << 4 | universe`)
    pub fn sub_uni(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// Split into `(net, sub_net, universe)`
    pub fn parts(self) -> (u8, u8, u8) {
        (self.net(), self.sub_net(), self.universe())
    }
}

impl fmt::Display for PortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.net(), self.sub_net(), self.universe())
    }
}

impl FromStr for PortAddress {
    type Err = ArtNetError;

    /// Accepts `"net:subnet:universe"` or a plain decimal port-address.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || ArtNetError::InvalidPortAddress(format!("cannot parse '{}'", s));

        if !s.contains(':') {
            let raw: u16 = s.parse().map_err(|_| invalid())?;
            return Self::from_raw(raw);
        }

        let mut parts = s.split(':');
        let mut next = || -> Result<u8> {
            parts
                .next()
                .and_then(|p| p.trim().parse::<u8>().ok())
                .ok_or_else(invalid)
        };
        let net = next()?;
        let sub_net = next()?;
        let universe = next()?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Self::new(net, sub_net, universe)
    }
}

impl TryFrom<u16> for PortAddress {
    type Error = ArtNetError;

    fn try_from(raw: u16) -> Result<Self> {
        Self::from_raw(raw)
    }
}

impl TryFrom<String> for PortAddress {
    type Error = ArtNetError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<PortAddress> for String {
    fn from(address: PortAddress) -> Self {
        address.to_string()
    }
}

impl From<PortAddress> for u16 {
    fn from(address: PortAddress) -> Self {
        address.0
    }
}

/// Anything that names a universe: a raw port-address, its string form, or a
/// [`PortAddress`] handle.
pub trait UniverseKey {
    fn port_address(&self) -> Result<PortAddress>;
}

impl UniverseKey for PortAddress {
    fn port_address(&self) -> Result<PortAddress> {
        Ok(*self)
    }
}

impl UniverseKey for u16 {
    fn port_address(&self) -> Result<PortAddress> {
        PortAddress::from_raw(*self)
    }
}

impl UniverseKey for str {
    fn port_address(&self) -> Result<PortAddress> {
        self.parse()
    }
}

impl UniverseKey for String {
    fn port_address(&self) -> Result<PortAddress> {
        self.parse()
    }
}

impl<K: UniverseKey + ?Sized> UniverseKey for &K {
    fn port_address(&self) -> Result<PortAddress> {
        (**self).port_address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_wire_net_out_of_range() {
        assert_eq!(PortAddress::from_wire(1, 0x07).unwrap().raw(), 263);
        assert!(matches!(
            PortAddress::from_wire(0x80, 0x05),
            Err(ArtNetError::InvalidPortAddress(_))
        ));
        assert_eq!(PortAddress::from_switches(0, 1, 0x18).unwrap().raw(), 24);
        assert!(PortAddress::from_switches(0xFF, 0, 1).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(PortAddress::from_raw(4).unwrap().to_string(), "0:0:4");
        assert_eq!(PortAddress::from_raw(0x15).unwrap().to_string(), "0:1:5");
        assert_eq!(PortAddress::from_raw(0x315).unwrap().to_string(), "3:1:5");
        assert_eq!(PortAddress::from_raw(0x7FF).unwrap().to_string(), "7:15:15");
        assert_eq!(PortAddress::from_raw(0xFFF).unwrap().to_string(), "15:15:15");
        assert_eq!(
            PortAddress::from_raw(0x7FFF).unwrap().to_string(),
            "127:15:15"
        );
    }

    #[test]
    fn test_out_of_range() {
        // Only 128 nets
        assert!(PortAddress::from_raw(0x8FFF).is_err());
        assert!(PortAddress::new(128, 0, 0).is_err());
        assert!(PortAddress::new(0, 16, 0).is_err());
        assert!(PortAddress::new(0, 0, 16).is_err());

        match PortAddress::new(200, 0, 0) {
            Err(ArtNetError::InvalidPortAddress(_)) => {}
            other => panic!("Expected InvalidPortAddress, got {:?}", other),
        }
    }

    #[test]
    fn test_parse() {
        let address: PortAddress = "1:0:7".parse().unwrap();
        assert_eq!(address.raw(), 263);

        let address: PortAddress = "0:1:8".parse().unwrap();
        assert_eq!(address.raw(), 24);

        let address: PortAddress = " 263 ".parse().unwrap();
        assert_eq!(address.to_string(), "1:0:7");

        assert!("1:0".parse::<PortAddress>().is_err());
        assert!("1:0:7:1".parse::<PortAddress>().is_err());
        assert!("128:0:0".parse::<PortAddress>().is_err());
        assert!("a:b:c".parse::<PortAddress>().is_err());
        assert!("40000".parse::<PortAddress>().is_err());
    }

    #[test]
    fn test_universe_key() {
        let from_int = 263u16.port_address().unwrap();
        let from_str = "1:0:7".port_address().unwrap();
        let from_string = String::from("1:0:7").port_address().unwrap();
        assert_eq!(from_int, from_str);
        assert_eq!(from_str, from_string);
        assert_eq!(from_int.port_address().unwrap(), from_int);
    }

    #[test]
    fn test_serde_as_string() {
        let address = PortAddress::new(3, 1, 5).unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"3:1:5\"");
        let back: PortAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }

    proptest! {
        #[test]
        fn prop_round_trip(raw in 0u16..=MAX_PORT_ADDRESS) {
            let address = PortAddress::from_raw(raw).unwrap();
            let (net, sub_net, universe) = address.parts();
            let rebuilt = PortAddress::new(net, sub_net, universe).unwrap();
            prop_assert_eq!(rebuilt.raw(), raw);
            prop_assert_eq!(address.to_string().parse::<PortAddress>().unwrap(), address);
        }

        #[test]
        fn prop_rejects_high_net(net in 128u8..=255, sub_net in 0u8..16, universe in 0u8..16) {
            prop_assert!(PortAddress::new(net, sub_net, universe).is_err());
        }
    }
}
