//! artflow-net - Art-Net node and controller engine
//!
//! Implements the discovery and DMX parts of Art-Net 4 over UDP:
//! - **Codec**: ArtPoll, ArtPollReply and ArtDmx encode/decode
//! - **Discovery**: remote nodes, their bind pages and ports
//! - **Universes**: last frame, publishers and subscribers per port-address
//! - **Local node**: what this engine announces about itself
//! - **Engine**: poll/announce state machine and DMX routing
//! - **Runtime**: tokio UDP loop driving the engine
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::net::Ipv4Addr;
//! use artflow_net::ArtNetRuntime;
//!
//! # async fn demo() -> artflow_net::Result<()> {
//! let runtime = ArtNetRuntime::connect(
//!     Ipv4Addr::new(2, 255, 255, 255),
//!     Ipv4Addr::new(2, 0, 0, 10),
//! )
//! .await?;
//!
//! let universe = runtime.set_port_config("0:0:1", true, false)?;
//! runtime.set_dmx(universe, &[255, 128, 0])?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`codec`] - Art-Net packet layouts
//! - [`port_address`] - 15-bit universe addressing
//! - [`node`] - Remote node registry
//! - [`universe`] - Universe registry
//! - [`local`] - Local node descriptor
//! - [`engine`] - Protocol engine
//! - [`runtime`] - Async driver
//! - [`config`] - TOML configuration
//! - [`error`] - Error types

#![allow(missing_docs)]

/// Art-Net packet encode/decode
pub mod codec;
/// Engine configuration
pub mod config;
/// Protocol engine
pub mod engine;
/// Error types
pub mod error;
/// Engine notifications
pub mod events;
/// Local node descriptor
pub mod local;
/// Remote nodes and ports
pub mod node;
/// Port-address type
pub mod port_address;
/// Async UDP driver
pub mod runtime;
/// Send-side transport abstraction
pub mod transport;
/// Universe registry
pub mod universe;

// Re-exports
pub use codec::{ArtPacket, NodeStyle, ARTNET_PORT, DMX_UNIVERSE_SIZE};
pub use config::{ArtNetConfig, PortConfig};
pub use engine::ArtNetEngine;
pub use error::{ArtNetError, Result};
pub use events::EngineEvent;
pub use local::LocalNode;
pub use node::{Node, Port, PortDirection};
pub use port_address::{PortAddress, UniverseKey};
pub use runtime::ArtNetRuntime;
pub use transport::{MemoryNetwork, MemoryTransport, Transport, UdpTransport};
pub use universe::Universe;
