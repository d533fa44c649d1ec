//! Universe registry
//!
//! Every port-address the engine has ever heard of gets a [`Universe`]:
//! the last frame received (or published) on it, which nodes publish into it
//! and which subscribe to it. Universes are created lazily and never removed;
//! there can be at most 32768 of them.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use crate::codec::DMX_UNIVERSE_SIZE;
use crate::node::{Port, PortDirection};
use crate::port_address::PortAddress;

/// One DMX universe as seen from this engine
#[derive(Debug, Clone)]
pub struct Universe {
    address: PortAddress,
    last_data: [u8; DMX_UNIVERSE_SIZE],
    /// Nodes with an input port into this address
    publishers: BTreeSet<Ipv4Addr>,
    /// Nodes with an output port driving this address
    subscribers: BTreeSet<Ipv4Addr>,
    sequence_by_publisher: HashMap<(Ipv4Addr, u8), u8>,
    last_send_sequence: u8,
    last_send_time: Option<Instant>,
}

impl Universe {
    pub fn new(address: PortAddress) -> Self {
        Self {
            address,
            last_data: [0; DMX_UNIVERSE_SIZE],
            publishers: BTreeSet::new(),
            subscribers: BTreeSet::new(),
            sequence_by_publisher: HashMap::new(),
            last_send_sequence: 0,
            last_send_time: None,
        }
    }

    pub fn address(&self) -> PortAddress {
        self.address
    }

    /// Latest frame, received or published
    pub fn data(&self) -> &[u8; DMX_UNIVERSE_SIZE] {
        &self.last_data
    }

    pub fn publishers(&self) -> &BTreeSet<Ipv4Addr> {
        &self.publishers
    }

    pub fn subscribers(&self) -> &BTreeSet<Ipv4Addr> {
        &self.subscribers
    }

    /// Last sequence seen from `(ip, physical port)`
    pub fn sequence_for(&self, ip: Ipv4Addr, physical: u8) -> Option<u8> {
        self.sequence_by_publisher.get(&(ip, physical)).copied()
    }

    /// Number of `(ip, physical port)` pairs with a recorded sequence
    pub fn sequenced_sources(&self) -> usize {
        self.sequence_by_publisher.len()
    }

    pub fn last_send_sequence(&self) -> u8 {
        self.last_send_sequence
    }

    pub fn last_send_time(&self) -> Option<Instant> {
        self.last_send_time
    }

    /// Overwrite the start of the buffer with `data`.
    ///
    /// Anything past 512 bytes is ignored. Returns the number of bytes written.
    pub(crate) fn write_data(&mut self, data: &[u8]) -> usize {
        let len = data.len().min(DMX_UNIVERSE_SIZE);
        self.last_data[..len].copy_from_slice(&data[..len]);
        len
    }

    /// Remember the sender's sequence number. Zero means "unsequenced" and is
    /// never stored.
    pub(crate) fn record_sequence(&mut self, ip: Ipv4Addr, physical: u8, sequence: u8) {
        if sequence != 0 {
            self.sequence_by_publisher.insert((ip, physical), sequence);
        }
    }

    /// Advance the outgoing sequence through 1..=255 and stamp the send time
    pub(crate) fn next_send_sequence(&mut self, now: Instant) -> u8 {
        self.last_send_sequence = match self.last_send_sequence {
            255 => 1,
            n => n + 1,
        };
        self.last_send_time = Some(now);
        self.last_send_sequence
    }

    /// True if nothing was sent within `interval`
    pub(crate) fn refresh_due(&self, now: Instant, interval: Duration) -> bool {
        match self.last_send_time {
            Some(sent) => now.saturating_duration_since(sent) >= interval,
            None => true,
        }
    }

    fn members_mut(&mut self, direction: PortDirection) -> &mut BTreeSet<Ipv4Addr> {
        match direction {
            PortDirection::Input => &mut self.publishers,
            PortDirection::Output => &mut self.subscribers,
        }
    }
}

/// All universes, keyed by port-address
#[derive(Debug, Default)]
pub struct UniverseRegistry {
    universes: BTreeMap<PortAddress, Universe>,
}

impl UniverseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a universe, creating a zero-filled one on first use
    pub fn get_or_create(&mut self, address: PortAddress) -> &mut Universe {
        self.universes
            .entry(address)
            .or_insert_with(|| Universe::new(address))
    }

    pub fn get(&self, address: PortAddress) -> Option<&Universe> {
        self.universes.get(&address)
    }

    pub fn get_mut(&mut self, address: PortAddress) -> Option<&mut Universe> {
        self.universes.get_mut(&address)
    }

    /// Universes in port-address order
    pub fn iter(&self) -> impl Iterator<Item = &Universe> {
        self.universes.values()
    }

    pub fn len(&self) -> usize {
        self.universes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.universes.is_empty()
    }

    /// Add `node` to the publisher or subscriber set `port` points at
    pub(crate) fn link(&mut self, port: &Port, node: Ipv4Addr) {
        self.get_or_create(port.address)
            .members_mut(port.direction)
            .insert(node);
    }

    /// Remove `node` from the publisher or subscriber set `port` points at
    pub(crate) fn unlink(&mut self, port: &Port, node: Ipv4Addr) {
        if let Some(universe) = self.universes.get_mut(&port.address) {
            universe.members_mut(port.direction).remove(&node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(raw: u16) -> PortAddress {
        PortAddress::from_raw(raw).unwrap()
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut registry = UniverseRegistry::new();
        registry.get_or_create(address(1)).write_data(&[9, 9]);
        assert_eq!(registry.get_or_create(address(1)).data()[0], 9);
        assert_eq!(registry.len(), 1);

        let fresh = registry.get_or_create(address(2));
        assert!(fresh.data().iter().all(|&b| b == 0));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_write_data_truncates() {
        let mut universe = Universe::new(address(0));
        let frame = [7u8; 600];
        assert_eq!(universe.write_data(&frame), 512);
        assert!(universe.data().iter().all(|&b| b == 7));

        // Shorter frames only overwrite their prefix
        assert_eq!(universe.write_data(&[1, 2]), 2);
        assert_eq!(&universe.data()[..3], &[1, 2, 7]);
    }

    #[test]
    fn test_sequence_zero_not_recorded() {
        let mut universe = Universe::new(address(0));
        let ip = Ipv4Addr::new(10, 0, 0, 1);

        universe.record_sequence(ip, 0, 0);
        assert_eq!(universe.sequenced_sources(), 0);

        universe.record_sequence(ip, 0, 5);
        universe.record_sequence(ip, 0, 3);
        universe.record_sequence(ip, 1, 200);
        assert_eq!(universe.sequence_for(ip, 0), Some(3));
        assert_eq!(universe.sequence_for(ip, 1), Some(200));
        assert_eq!(universe.sequenced_sources(), 2);
    }

    #[test]
    fn test_send_sequence_wraps_past_zero() {
        let mut universe = Universe::new(address(0));
        let now = Instant::now();

        let sequences: Vec<u8> = (0..256).map(|_| universe.next_send_sequence(now)).collect();
        assert_eq!(sequences[0], 1);
        assert_eq!(sequences[254], 255);
        assert_eq!(sequences[255], 1);
        assert!(!sequences.contains(&0));
    }

    #[test]
    fn test_refresh_due() {
        let mut universe = Universe::new(address(0));
        let now = Instant::now();
        let interval = Duration::from_secs(1);

        assert!(universe.refresh_due(now, interval));
        universe.next_send_sequence(now);
        assert!(!universe.refresh_due(now + Duration::from_millis(500), interval));
        assert!(universe.refresh_due(now + Duration::from_millis(1000), interval));
    }

    #[test]
    fn test_link_and_unlink() {
        let mut registry = UniverseRegistry::new();
        let ip = Ipv4Addr::new(10, 0, 0, 1);
        let input = Port::new(PortDirection::Input, 0, address(263));
        let output = Port::new(PortDirection::Output, 0, address(24));

        registry.link(&input, ip);
        registry.link(&output, ip);
        assert!(registry.get(address(263)).unwrap().publishers().contains(&ip));
        assert!(registry.get(address(24)).unwrap().subscribers().contains(&ip));

        registry.unlink(&input, ip);
        assert!(registry.get(address(263)).unwrap().publishers().is_empty());
        // Universes outlive their members
        assert_eq!(registry.len(), 2);
    }
}
