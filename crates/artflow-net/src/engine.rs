//! Art-Net protocol engine
//!
//! A single-threaded state machine owning the node registry, the universe
//! registry and the local node descriptor. It is driven by three kinds of
//! input, all of which take `&mut self`:
//!
//! - [`handle_datagram`](ArtNetEngine::handle_datagram) for every received
//!   datagram,
//! - [`poll_tick`](ArtNetEngine::poll_tick) on the poll timer (~3 s),
//! - [`dmx_tick`](ArtNetEngine::dmx_tick) on the DMX repeat timer (~100 ms).
//!
//! Local configuration calls (`set_port_config`, name/style setters) trigger
//! an immediate announce unless the engine is passive, in which case a single
//! announce is sent when passive mode is left.
//!
//! Nothing in the receive path returns an error: foreign traffic, truncated
//! packets and unsupported opcodes are logged and dropped per datagram.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::codec::{
    self, encode_dmx, encode_poll, encode_poll_reply, ArtDmx, ArtPacket, ArtPoll, ArtPollReply,
    NodeStyle, ARTNET_PORT, DMX_UNIVERSE_SIZE,
};
use crate::config::ArtNetConfig;
use crate::events::{EngineEvent, EventQueue};
use crate::local::LocalNode;
use crate::node::{Node, NodeIdentity, NodeInfo, NodeRegistry, Port};
use crate::port_address::{PortAddress, UniverseKey};
use crate::transport::Transport;
use crate::universe::{Universe, UniverseRegistry};
use crate::{error::ArtNetError, Result};

/// Physical port number stamped on frames this engine publishes
const LOCAL_PHYSICAL_PORT: u8 = 0;

/// The Art-Net protocol engine
pub struct ArtNetEngine<T: Transport> {
    transport: T,
    broadcast: SocketAddrV4,
    local: LocalNode,
    nodes: NodeRegistry,
    universes: UniverseRegistry,
    passive: bool,
    /// A local change was suppressed while passive
    pending_announce: bool,
    /// Pages sent by the last announce
    announced_pages: usize,
    refresh_interval: Duration,
    node_timeout: Option<Duration>,
    events: EventQueue,
}

impl<T: Transport> ArtNetEngine<T> {
    /// Build an engine from `config`, sending through `transport`.
    ///
    /// Ports listed in the config are applied without announcing; callers
    /// announce once when they start feeding the engine.
    pub fn new(config: &ArtNetConfig, transport: T) -> Result<Self> {
        config.validate()?;

        let local = LocalNode::new(
            config.unicast_ip,
            &config.short_name,
            &config.long_name,
            config.style,
        )
        .with_vendor(config.firmware, config.oem_code, config.esta_code)
        .with_mac(config.mac);

        let mut engine = Self {
            transport,
            broadcast: SocketAddrV4::new(config.broadcast_ip, ARTNET_PORT),
            local,
            nodes: NodeRegistry::new(),
            universes: UniverseRegistry::new(),
            passive: config.passive,
            pending_announce: false,
            announced_pages: 0,
            refresh_interval: config.refresh_interval(),
            node_timeout: config.node_timeout(),
            events: EventQueue::new(config.event_capacity),
        };

        for port in &config.ports {
            engine.local.set_port(port.universe, port.input, port.output)?;
            engine.universes.get_or_create(port.universe);
        }

        tracing::info!(
            "Art-Net engine '{}' on {} (broadcast {})",
            engine.local.short_name(),
            config.unicast_ip,
            config.broadcast_ip
        );

        Ok(engine)
    }

    // ---------------------------------------------------------------------
    // Inbound
    // ---------------------------------------------------------------------

    /// Process one received datagram
    pub fn handle_datagram(&mut self, payload: &[u8], source: SocketAddrV4, now: Instant) {
        let packet = match codec::decode(payload) {
            Ok(packet) => packet,
            Err(e) if e.is_foreign_traffic() => {
                tracing::trace!("Ignoring non Art-Net datagram from {}", source);
                return;
            }
            Err(e) => {
                tracing::debug!("Dropping datagram from {}: {}", source, e);
                return;
            }
        };

        match packet {
            ArtPacket::Poll(poll) => self.on_poll(poll, source),
            ArtPacket::PollReply(reply) => self.on_poll_reply(*reply, source, now),
            ArtPacket::Dmx(dmx) => self.on_dmx(dmx, source),
        }
    }

    fn on_poll(&mut self, poll: ArtPoll, source: SocketAddrV4) {
        tracing::trace!(
            "ArtPoll from {}: version {} flags {:#04x}",
            source,
            poll.version,
            poll.flags
        );
        self.announce();
    }

    fn on_poll_reply(&mut self, reply: ArtPollReply, source: SocketAddrV4, now: Instant) {
        let ip = reply.ip;
        let ports = match reply.advertised_ports() {
            Ok(ports) => ports,
            Err(e) => {
                tracing::debug!("Dropping ArtPollReply from {}: {}", source, e);
                return;
            }
        };
        let known = self.nodes.get(ip).is_some();
        let identity = NodeIdentity {
            ip,
            short_name: reply.short_name.clone(),
            long_name: reply.long_name.clone(),
            style: reply.style,
        };
        let info = NodeInfo {
            firmware: reply.firmware,
            oem: reply.oem,
            esta_code: reply.esta_code,
            mac: reply.mac,
            node_report: reply.node_report.clone(),
            status1: reply.status1,
            status2: reply.status2,
        };

        let (node, changed) =
            self.nodes
                .upsert(&mut self.universes, identity, info, source, now);
        if changed {
            tracing::info!("Art-Net node {} ({})", node, node.short_name());
            let event = if known {
                EngineEvent::NodeReplaced {
                    ip,
                    short_name: node.short_name().to_string(),
                    long_name: node.long_name().to_string(),
                }
            } else {
                EngineEvent::NodeDiscovered {
                    ip,
                    short_name: node.short_name().to_string(),
                    long_name: node.long_name().to_string(),
                }
            };
            self.events.push(event);
        }

        let bind_index = reply.page();
        for port in &ports {
            self.universes.get_or_create(port.address);
        }

        let diff = self
            .nodes
            .apply_ports(&mut self.universes, ip, bind_index, &ports);
        if !diff.is_empty() {
            tracing::debug!(
                "Node {} page {}: +{} -{} ports",
                ip,
                bind_index,
                diff.added.len(),
                diff.removed.len()
            );
            self.events.push(EngineEvent::PortsChanged {
                ip,
                bind_index,
                added: diff.added,
                removed: diff.removed,
            });
        }
    }

    fn on_dmx(&mut self, dmx: ArtDmx, source: SocketAddrV4) {
        if dmx.declared_length as usize > DMX_UNIVERSE_SIZE {
            tracing::trace!(
                "Truncating {}-byte DMX frame for {} from {}",
                dmx.declared_length,
                dmx.address,
                source
            );
        }

        let universe = self.universes.get_or_create(dmx.address);
        universe.record_sequence(*source.ip(), dmx.physical, dmx.sequence);
        let length = universe.write_data(&dmx.data);

        self.events.push(EngineEvent::DmxReceived {
            address: dmx.address,
            source: *source.ip(),
            length,
        });
    }

    // ---------------------------------------------------------------------
    // Timers
    // ---------------------------------------------------------------------

    /// Poll timer: broadcast an ArtPoll and expire silent nodes.
    /// Does nothing while passive.
    pub fn poll_tick(&mut self, now: Instant) {
        if self.passive {
            return;
        }

        tracing::trace!("Sending ArtPoll to {}", self.broadcast);
        self.send(&encode_poll(), self.broadcast);

        if let Some(timeout) = self.node_timeout {
            for node in self.nodes.expire(&mut self.universes, now, timeout) {
                tracing::info!("Art-Net node {} timed out", node);
                self.events.push(EngineEvent::NodeLost { ip: node.ip() });
            }
        }
    }

    /// DMX repeat timer: resend every published universe not refreshed
    /// within the refresh interval
    pub fn dmx_tick(&mut self, now: Instant) {
        let published: Vec<PortAddress> = self.local.published_addresses().collect();
        for address in published {
            let due = self
                .universes
                .get_or_create(address)
                .refresh_due(now, self.refresh_interval);
            if due {
                self.send_frame(address, now);
            }
        }
    }

    // ---------------------------------------------------------------------
    // Outbound
    // ---------------------------------------------------------------------

    /// Send one ArtPollReply per local bind page.
    ///
    /// Always sends at least one page, and empty pages for bind indices that
    /// were announced last time but no longer exist, so peers drop them.
    pub fn announce(&mut self) {
        let mut pages: Vec<(u8, Vec<Port>)> = self
            .local
            .pages()
            .map(|(bind_index, ports)| (bind_index, ports.to_vec()))
            .collect();
        if pages.is_empty() {
            pages.push((1, Vec::new()));
        }
        let page_count = pages.len();
        for vacated in page_count + 1..=self.announced_pages {
            pages.push((vacated as u8, Vec::new()));
        }

        for (bind_index, ports) in &pages {
            self.local.count_reply();
            let packet = encode_poll_reply(&self.local, *bind_index, ports);
            self.send(&packet, self.broadcast);
        }
        tracing::trace!("Announced {} bind page(s)", pages.len());

        self.announced_pages = page_count;
        self.pending_announce = false;
    }

    /// Stamp a new sequence on `address` and send its buffer to every
    /// subscriber
    fn send_frame(&mut self, address: PortAddress, now: Instant) {
        let universe = self.universes.get_or_create(address);
        let sequence = universe.next_send_sequence(now);
        let packet = encode_dmx(address, sequence, LOCAL_PHYSICAL_PORT, universe.data());

        let targets: Vec<SocketAddrV4> = universe
            .subscribers()
            .iter()
            .filter_map(|ip| self.nodes.get(*ip))
            .map(Node::address)
            .collect();

        for target in targets {
            self.send(&packet, target);
        }
        tracing::trace!("Sent ArtDmx {} seq {}", address, sequence);
    }

    fn send(&self, packet: &[u8], target: SocketAddrV4) {
        if let Err(e) = self.transport.send_to(packet, target) {
            tracing::warn!("Art-Net send to {} failed: {}", target, e);
        }
    }

    fn local_changed(&mut self) {
        if self.passive {
            self.pending_announce = true;
        } else {
            self.announce();
        }
    }

    // ---------------------------------------------------------------------
    // Application API
    // ---------------------------------------------------------------------

    /// Publish `data` into a universe this node has an input port on.
    ///
    /// The buffer is overwritten and one frame goes out to current
    /// subscribers right away, on top of the periodic resend.
    ///
    /// # Errors
    /// * [`ArtNetError::InvalidPortAddress`] - `key` does not name a universe
    /// * [`ArtNetError::NotAPublisher`] - no local input port on that address
    pub fn set_dmx<K: UniverseKey>(&mut self, key: K, data: &[u8]) -> Result<()> {
        self.set_dmx_at(key, data, Instant::now())
    }

    /// [`set_dmx`](Self::set_dmx) with the send time supplied by the caller,
    /// which the next refresh deadline counts from
    pub fn set_dmx_at<K: UniverseKey>(&mut self, key: K, data: &[u8], now: Instant) -> Result<()> {
        let address = key.port_address()?;
        if !self.local.is_publisher(address) {
            return Err(ArtNetError::NotAPublisher(address));
        }

        self.universes.get_or_create(address).write_data(data);
        self.send_frame(address, now);
        Ok(())
    }

    /// Create, replace or (with both flags false) remove the local port on
    /// a universe. Returns the universe's port-address.
    pub fn set_port_config<K: UniverseKey>(
        &mut self,
        key: K,
        is_input: bool,
        is_output: bool,
    ) -> Result<PortAddress> {
        let address = key.port_address()?;
        let changed = self.local.set_port(address, is_input, is_output)?;
        self.universes.get_or_create(address);

        if changed {
            tracing::debug!(
                "Local port {} input={} output={}",
                address,
                is_input,
                is_output
            );
            self.local_changed();
        }
        Ok(address)
    }

    pub fn set_short_name(&mut self, name: &str) {
        if self.local.set_short_name(name) {
            self.local_changed();
        }
    }

    pub fn set_long_name(&mut self, name: &str) {
        if self.local.set_long_name(name) {
            self.local_changed();
        }
    }

    pub fn set_style(&mut self, style: NodeStyle) {
        if self.local.set_style(style) {
            self.local_changed();
        }
    }

    /// Suppress announcements (and polling) while batching edits. Leaving
    /// passive mode announces once if anything changed meanwhile.
    pub fn set_passive(&mut self, passive: bool) {
        self.passive = passive;
        if !passive && self.pending_announce {
            self.announce();
        }
    }

    pub fn is_passive(&self) -> bool {
        self.passive
    }

    pub fn local(&self) -> &LocalNode {
        &self.local
    }

    pub fn unicast_ip(&self) -> Ipv4Addr {
        self.local.ip()
    }

    pub fn broadcast_address(&self) -> SocketAddrV4 {
        self.broadcast
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn node(&self, ip: Ipv4Addr) -> Option<&Node> {
        self.nodes.get(ip)
    }

    /// Snapshot of all known nodes
    pub fn get_nodes(&self) -> Vec<Node> {
        self.nodes.iter().cloned().collect()
    }

    pub fn universes(&self) -> impl Iterator<Item = &Universe> {
        self.universes.iter()
    }

    pub fn universe<K: UniverseKey>(&self, key: K) -> Result<Option<&Universe>> {
        Ok(self.universes.get(key.port_address()?))
    }

    /// Latest frame of a universe; all zeros if nothing was seen yet
    pub fn universe_data<K: UniverseKey>(&self, key: K) -> Result<[u8; DMX_UNIVERSE_SIZE]> {
        let address = key.port_address()?;
        Ok(self
            .universes
            .get(address)
            .map(|u| *u.data())
            .unwrap_or([0; DMX_UNIVERSE_SIZE]))
    }

    /// Receiver for node and port notifications
    pub fn events(&self) -> Receiver<EngineEvent> {
        self.events.receiver()
    }

    /// Receiver for [`EngineEvent::DmxReceived`], one per stored frame
    pub fn dmx_events(&self) -> Receiver<EngineEvent> {
        self.events.dmx_receiver()
    }

    /// Events lost because nobody drained the channel
    pub fn dropped_events(&self) -> u64 {
        self.events.dropped()
    }
}
