#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Instant;

use artflow_net::codec::encode_poll_reply;
use artflow_net::{
    ArtNetConfig, ArtNetEngine, LocalNode, MemoryNetwork, MemoryTransport, NodeStyle, Port,
    ARTNET_PORT,
};

pub const BROADCAST: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 255);

pub fn host(last_octet: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, last_octet)
}

pub fn source(last_octet: u8) -> SocketAddrV4 {
    SocketAddrV4::new(host(last_octet), ARTNET_PORT)
}

pub fn config(name: &str, last_octet: u8) -> ArtNetConfig {
    ArtNetConfig::new(BROADCAST, host(last_octet)).with_names(name, &format!("{} node", name))
}

/// Engines sharing one in-memory broadcast domain
pub struct Lan {
    pub network: MemoryNetwork,
    pub engines: Vec<ArtNetEngine<MemoryTransport>>,
}

impl Lan {
    pub fn new() -> Self {
        Self {
            network: MemoryNetwork::new(),
            engines: Vec::new(),
        }
    }

    /// Add an engine at `10.0.0.<last_octet>` and return its index
    pub fn add(&mut self, name: &str, last_octet: u8) -> usize {
        self.add_with(config(name, last_octet))
    }

    pub fn add_with(&mut self, config: ArtNetConfig) -> usize {
        let transport = self.network.endpoint(config.unicast_ip);
        self.engines
            .push(ArtNetEngine::new(&config, transport).unwrap());
        self.engines.len() - 1
    }

    /// Deliver queued datagrams until the network is quiet. Broadcasts reach
    /// every engine, the sender included; unicasts reach the engine owning
    /// the target address. Returns the number of datagrams delivered.
    pub fn drain(&mut self, now: Instant) -> usize {
        let mut delivered = 0;
        while let Some(datagram) = self.network.pop() {
            delivered += 1;
            assert!(delivered < 10_000, "datagram storm");

            let target = *datagram.target.ip();
            for engine in &mut self.engines {
                if target == BROADCAST || target == engine.unicast_ip() {
                    engine.handle_datagram(&datagram.payload, datagram.source, now);
                }
            }
        }
        delivered
    }
}

/// An ArtPollReply as a remote node at `10.0.0.<last_octet>` would send it
pub fn remote_reply(
    last_octet: u8,
    short_name: &str,
    long_name: &str,
    bind_index: u8,
    ports: &[Port],
) -> Vec<u8> {
    let remote = LocalNode::new(host(last_octet), short_name, long_name, NodeStyle::Node);
    encode_poll_reply(&remote, bind_index, ports)
}
