//! Engine configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! broadcast_ip = "2.255.255.255"
//! unicast_ip = "2.0.0.10"
//! short_name = "artflow"
//! long_name = "artflow Art-Net node"
//!
//! [[ports]]
//! universe = "0:0:1"
//! input = true
//! ```

use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::NodeStyle;
use crate::port_address::PortAddress;
use crate::{error::ArtNetError, Result};

/// One locally configured port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    /// `"net:subnet:universe"`
    pub universe: PortAddress,
    /// Publish into this universe
    #[serde(default)]
    pub input: bool,
    /// Subscribe to this universe
    #[serde(default)]
    pub output: bool,
}

/// Art-Net engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtNetConfig {
    /// Directed broadcast address of the Art-Net interface
    pub broadcast_ip: Ipv4Addr,
    /// This host's address on that interface, announced in replies.
    /// Has no usable default and must be set.
    pub unicast_ip: Ipv4Addr,
    /// UDP port to bind (6454 unless testing)
    pub port: u16,
    pub short_name: String,
    pub long_name: String,
    pub style: NodeStyle,
    pub firmware: u16,
    pub oem_code: u16,
    pub esta_code: u16,
    pub mac: [u8; 6],
    /// ArtPoll period
    pub poll_interval_ms: u64,
    /// How often published universes are checked for a resend
    pub dmx_tick_ms: u64,
    /// Resend a published universe if nothing went out for this long
    pub refresh_interval_ms: u64,
    /// Forget nodes silent for this long; never when unset
    pub node_timeout_ms: Option<u64>,
    pub event_capacity: usize,
    /// Start with announcements suppressed
    pub passive: bool,
    pub ports: Vec<PortConfig>,
}

impl Default for ArtNetConfig {
    fn default() -> Self {
        Self {
            broadcast_ip: Ipv4Addr::BROADCAST,
            unicast_ip: Ipv4Addr::UNSPECIFIED,
            port: crate::codec::ARTNET_PORT,
            short_name: "artflow".to_string(),
            long_name: "artflow Art-Net node".to_string(),
            style: NodeStyle::Controller,
            firmware: 0,
            oem_code: 0x00FF,
            esta_code: 0x7FF0,
            mac: [0; 6],
            poll_interval_ms: 3000,
            dmx_tick_ms: 100,
            refresh_interval_ms: 1000,
            node_timeout_ms: None,
            event_capacity: 256,
            passive: false,
            ports: Vec::new(),
        }
    }
}

impl ArtNetConfig {
    /// Config for the given interface addresses, defaults otherwise
    pub fn new(broadcast_ip: Ipv4Addr, unicast_ip: Ipv4Addr) -> Self {
        Self {
            broadcast_ip,
            unicast_ip,
            ..Default::default()
        }
    }

    pub fn with_names(mut self, short_name: &str, long_name: &str) -> Self {
        self.short_name = short_name.to_string();
        self.long_name = long_name.to_string();
        self
    }

    pub fn with_style(mut self, style: NodeStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_port(mut self, universe: PortAddress, input: bool, output: bool) -> Self {
        self.ports.push(PortConfig {
            universe,
            input,
            output,
        });
        self
    }

    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_passive(mut self, passive: bool) -> Self {
        self.passive = passive;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn dmx_tick(&self) -> Duration {
        Duration::from_millis(self.dmx_tick_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn node_timeout(&self) -> Option<Duration> {
        self.node_timeout_ms.map(Duration::from_millis)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(ArtNetError::InvalidConfig(
                "poll_interval_ms must be > 0".to_string(),
            ));
        }
        if self.dmx_tick_ms == 0 {
            return Err(ArtNetError::InvalidConfig(
                "dmx_tick_ms must be > 0".to_string(),
            ));
        }
        if self.refresh_interval_ms == 0 {
            return Err(ArtNetError::InvalidConfig(
                "refresh_interval_ms must be > 0".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(ArtNetError::InvalidConfig(
                "event_capacity must be > 0".to_string(),
            ));
        }
        if self.unicast_ip.is_unspecified() {
            return Err(ArtNetError::InvalidConfig(
                "unicast_ip must be set to this host's Art-Net address".to_string(),
            ));
        }
        if self.short_name.is_empty() {
            return Err(ArtNetError::InvalidConfig(
                "short_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!("Loaded Art-Net config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }
}
