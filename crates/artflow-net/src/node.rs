//! Remote nodes and their ports
//!
//! Nodes are keyed by the IP they announce in ArtPollReply. A node keeps its
//! identity (short name, long name, style) for as long as it keeps
//! announcing the same values; any change counts as a brand-new node and
//! its old universe memberships are dropped before the new ports are applied.
//!
//! Universe membership is stored as node IPs inside the [`UniverseRegistry`],
//! so every port added to or removed from a node goes through the registry
//! here to keep both sides consistent.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::codec::NodeStyle;
use crate::port_address::PortAddress;
use crate::universe::UniverseRegistry;

/// Media type code for DMX512 ports
pub const MEDIA_DMX512: u8 = 0x00;

/// Which way data flows through a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PortDirection {
    /// The node publishes DMX from its hardware input into the universe
    Input,
    /// The node drives DMX out, i.e. subscribes to the universe
    Output,
}

/// One input or output bound to a universe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Port {
    pub direction: PortDirection,
    pub media: u8,
    /// Also the key of the port's [`Universe`](crate::Universe)
    pub address: PortAddress,
}

impl Port {
    pub fn new(direction: PortDirection, media: u8, address: PortAddress) -> Self {
        Self {
            direction,
            media,
            address,
        }
    }

    pub fn input(address: PortAddress) -> Self {
        Self::new(PortDirection::Input, MEDIA_DMX512, address)
    }

    pub fn output(address: PortAddress) -> Self {
        Self::new(PortDirection::Output, MEDIA_DMX512, address)
    }
}

/// Fields that decide whether a reply continues an existing node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    pub ip: Ipv4Addr,
    pub short_name: String,
    pub long_name: String,
    pub style: NodeStyle,
}

/// Informational fields refreshed on every reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub firmware: u16,
    pub oem: u16,
    pub esta_code: u16,
    pub mac: [u8; 6],
    pub node_report: String,
    pub status1: u8,
    pub status2: u8,
}

/// A remote Art-Net participant
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    /// Unique per node object; a replaced node gets a new id
    id: u64,
    ip: Ipv4Addr,
    short_name: String,
    long_name: String,
    style: NodeStyle,
    /// Where its replies come from
    address: SocketAddrV4,
    info: NodeInfo,
    /// Bind index -> ports announced on that page
    bind_pages: BTreeMap<u8, Vec<Port>>,
    #[serde(skip)]
    last_reply: Instant,
}

impl Node {
    fn new(id: u64, identity: NodeIdentity, address: SocketAddrV4, now: Instant) -> Self {
        Self {
            id,
            ip: identity.ip,
            short_name: identity.short_name,
            long_name: identity.long_name,
            style: identity.style,
            address,
            info: NodeInfo::default(),
            bind_pages: BTreeMap::new(),
            last_reply: now,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn long_name(&self) -> &str {
        &self.long_name
    }

    pub fn style(&self) -> NodeStyle {
        self.style
    }

    /// Unicast address used to reach this node
    pub fn address(&self) -> SocketAddrV4 {
        self.address
    }

    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    pub fn last_reply(&self) -> Instant {
        self.last_reply
    }

    pub fn bind_pages(&self) -> &BTreeMap<u8, Vec<Port>> {
        &self.bind_pages
    }

    /// Ports of one bind page
    pub fn page(&self, bind_index: u8) -> &[Port] {
        self.bind_pages
            .get(&bind_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All ports, page by page
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.bind_pages.values().flatten()
    }

    fn same_identity(&self, identity: &NodeIdentity) -> bool {
        self.short_name == identity.short_name
            && self.long_name == identity.long_name
            && self.style == identity.style
    }

    fn has_port_outside_page(&self, port: &Port, bind_index: u8) -> bool {
        self.bind_pages
            .iter()
            .any(|(page, ports)| *page != bind_index && ports.contains(port))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArtNetNode<{},{}>", self.long_name, self.address)
    }
}

/// Result of applying one page of ports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortDiff {
    pub added: Vec<Port>,
    pub removed: Vec<Port>,
}

impl PortDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Remote nodes keyed by announced IP
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: BTreeMap<Ipv4Addr, Node>,
    next_id: u64,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reply from `identity.ip`.
    ///
    /// Returns the current node and whether it is new or replaced a node
    /// with different identity fields. A replaced node loses all of its
    /// universe memberships; its ports must be applied again.
    pub fn upsert(
        &mut self,
        universes: &mut UniverseRegistry,
        identity: NodeIdentity,
        info: NodeInfo,
        source: SocketAddrV4,
        now: Instant,
    ) -> (&Node, bool) {
        let ip = identity.ip;
        let continues = self
            .nodes
            .get(&ip)
            .map(|node| node.same_identity(&identity))
            .unwrap_or(false);

        if !continues {
            if let Some(old) = self.nodes.remove(&ip) {
                Self::unlink_all(universes, &old);
            }
        }

        let next_id = &mut self.next_id;
        let node = self.nodes.entry(ip).or_insert_with(|| {
            *next_id += 1;
            Node::new(*next_id, identity, source, now)
        });
        node.address = source;
        node.info = info;
        node.last_reply = now;

        (node, !continues)
    }

    /// Replace the ports of one bind page of `ip`.
    ///
    /// Ports that disappeared leave their universe, new ports join, unchanged
    /// ports are left alone. Other pages are not touched. Unknown nodes get an
    /// empty diff.
    pub fn apply_ports(
        &mut self,
        universes: &mut UniverseRegistry,
        ip: Ipv4Addr,
        bind_index: u8,
        ports: &[Port],
    ) -> PortDiff {
        let Some(node) = self.nodes.get_mut(&ip) else {
            return PortDiff::default();
        };

        let mut new_page: Vec<Port> = Vec::with_capacity(ports.len());
        for port in ports {
            if !new_page.contains(port) {
                new_page.push(*port);
            }
        }

        let old_page = node.bind_pages.remove(&bind_index).unwrap_or_default();
        let mut diff = PortDiff::default();

        for port in &old_page {
            if !new_page.contains(port) {
                diff.removed.push(*port);
                if !node.has_port_outside_page(port, bind_index) {
                    universes.unlink(port, ip);
                }
            }
        }
        for port in &new_page {
            if !old_page.contains(port) {
                diff.added.push(*port);
                universes.link(port, ip);
            }
        }

        if !new_page.is_empty() {
            node.bind_pages.insert(bind_index, new_page);
        }

        diff
    }

    /// Forget a node and all of its memberships
    pub fn remove(&mut self, universes: &mut UniverseRegistry, ip: Ipv4Addr) -> Option<Node> {
        let node = self.nodes.remove(&ip)?;
        Self::unlink_all(universes, &node);
        Some(node)
    }

    /// Remove nodes that have not replied within `timeout`
    pub fn expire(
        &mut self,
        universes: &mut UniverseRegistry,
        now: Instant,
        timeout: Duration,
    ) -> Vec<Node> {
        let stale: Vec<Ipv4Addr> = self
            .nodes
            .values()
            .filter(|node| now.saturating_duration_since(node.last_reply) > timeout)
            .map(|node| node.ip)
            .collect();

        stale
            .into_iter()
            .filter_map(|ip| self.remove(universes, ip))
            .collect()
    }

    pub fn get(&self, ip: Ipv4Addr) -> Option<&Node> {
        self.nodes.get(&ip)
    }

    /// Nodes in IP order
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn unlink_all(universes: &mut UniverseRegistry, node: &Node) {
        for port in node.ports() {
            universes.unlink(port, node.ip);
        }
    }
}
