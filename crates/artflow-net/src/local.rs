//! Local node descriptor
//!
//! What this engine announces about itself in ArtPollReply: names, style,
//! vendor codes and the locally configured ports. Ports are grouped into bind
//! pages the same way remote nodes are, one port-address per page. Packing up
//! to four ports with a shared net/sub-net into one page would be legal on the
//! wire but is not done.

use std::net::Ipv4Addr;

use crate::codec::poll_reply::{LONG_NAME_LEN, SHORT_NAME_LEN};
use crate::codec::NodeStyle;
use crate::node::{Port, PortDirection};
use crate::port_address::PortAddress;
use crate::{error::ArtNetError, Result};

/// Highest bind index a reply can carry
pub const MAX_BIND_PAGES: usize = 255;

/// The engine's own identity and ports
#[derive(Debug, Clone)]
pub struct LocalNode {
    ip: Ipv4Addr,
    short_name: String,
    long_name: String,
    style: NodeStyle,
    firmware: u16,
    oem_code: u16,
    esta_code: u16,
    mac: [u8; 6],
    /// `pages[i]` is bind index `i + 1`
    pages: Vec<Vec<Port>>,
    reply_count: u16,
}

impl LocalNode {
    pub fn new(ip: Ipv4Addr, short_name: &str, long_name: &str, style: NodeStyle) -> Self {
        Self {
            ip,
            short_name: clip(short_name, SHORT_NAME_LEN),
            long_name: clip(long_name, LONG_NAME_LEN),
            style,
            firmware: 0,
            oem_code: 0x00FF,
            esta_code: 0x7FF0,
            mac: [0; 6],
            pages: Vec::new(),
            reply_count: 0,
        }
    }

    /// Set vendor codes announced in replies
    pub fn with_vendor(mut self, firmware: u16, oem_code: u16, esta_code: u16) -> Self {
        self.firmware = firmware;
        self.oem_code = oem_code;
        self.esta_code = esta_code;
        self
    }

    pub fn with_mac(mut self, mac: [u8; 6]) -> Self {
        self.mac = mac;
        self
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

    pub fn firmware(&self) -> u16 {
        self.firmware
    }

    pub fn oem_code(&self) -> u16 {
        self.oem_code
    }

    pub fn esta_code(&self) -> u16 {
        self.esta_code
    }

    pub fn mac(&self) -> [u8; 6] {
        self.mac
    }

    /// Returns true if the name changed
    pub fn set_short_name(&mut self, name: &str) -> bool {
        replace_if_changed(&mut self.short_name, clip(name, SHORT_NAME_LEN))
    }

    /// Returns true if the name changed
    pub fn set_long_name(&mut self, name: &str) -> bool {
        replace_if_changed(&mut self.long_name, clip(name, LONG_NAME_LEN))
    }

    /// Returns true if the style changed
    pub fn set_style(&mut self, style: NodeStyle) -> bool {
        replace_if_changed(&mut self.style, style)
    }

    /// Configure the local port on `address`.
    ///
    /// Replaces any port already on that address, keeping its bind index.
    /// With neither direction set the port is removed and later pages move
    /// down one index. Returns true if anything changed.
    pub fn set_port(&mut self, address: PortAddress, is_input: bool, is_output: bool) -> Result<bool> {
        let mut page = Vec::with_capacity(2);
        if is_input {
            page.push(Port::input(address));
        }
        if is_output {
            page.push(Port::output(address));
        }

        let existing = self
            .pages
            .iter()
            .position(|ports| ports.iter().any(|p| p.address == address));

        match (existing, page.is_empty()) {
            (Some(index), true) => {
                self.pages.remove(index);
                Ok(true)
            }
            (Some(index), false) => Ok(replace_if_changed(&mut self.pages[index], page)),
            (None, true) => Ok(false),
            (None, false) => {
                if self.pages.len() >= MAX_BIND_PAGES {
                    return Err(ArtNetError::InvalidConfig(format!(
                        "cannot add {}: all {} bind pages in use",
                        address, MAX_BIND_PAGES
                    )));
                }
                self.pages.push(page);
                Ok(true)
            }
        }
    }

    /// `(bind index, ports)` for every page
    pub fn pages(&self) -> impl Iterator<Item = (u8, &[Port])> {
        self.pages
            .iter()
            .enumerate()
            .map(|(i, ports)| ((i + 1) as u8, ports.as_slice()))
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.pages.iter().flatten()
    }

    /// Addresses this node has an input port on
    pub fn published_addresses(&self) -> impl Iterator<Item = PortAddress> + '_ {
        self.ports()
            .filter(|p| p.direction == PortDirection::Input)
            .map(|p| p.address)
    }

    pub fn is_publisher(&self, address: PortAddress) -> bool {
        self.published_addresses().any(|a| a == address)
    }

    /// Node report for the next reply: `#0001 [count] artflow ok`
    pub fn node_report(&self) -> String {
        format!("#0001 [{:04}] artflow ok", self.reply_count % 10_000)
    }

    pub(crate) fn count_reply(&mut self) {
        self.reply_count = self.reply_count.wrapping_add(1);
    }
}

/// Names must leave room for the NUL terminator
fn clip(name: &str, field_len: usize) -> String {
    let max = field_len - 1;
    if name.len() <= max {
        return name.to_string();
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

fn replace_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> LocalNode {
        LocalNode::new(Ipv4Addr::new(10, 0, 0, 1), "alpha", "Alpha Console", NodeStyle::Controller)
    }

    fn address(s: &str) -> PortAddress {
        s.parse().unwrap()
    }

    #[test]
    fn test_setters_report_changes() {
        let mut node = local();
        assert!(!node.set_short_name("alpha"));
        assert!(node.set_short_name("charlie"));
        assert_eq!(node.short_name(), "charlie");
        assert!(node.set_style(NodeStyle::Media));
        assert!(!node.set_style(NodeStyle::Media));
    }

    #[test]
    fn test_names_are_clipped() {
        let mut node = local();
        node.set_short_name("a name that is far too long");
        assert_eq!(node.short_name().len(), SHORT_NAME_LEN - 1);

        // Never split a UTF-8 sequence
        node.set_short_name("ééééééééééé");
        assert!(node.short_name().len() <= SHORT_NAME_LEN - 1);
        assert_eq!(node.short_name(), "éééééééé");
    }

    #[test]
    fn test_one_page_per_address() {
        let mut node = local();
        assert!(node.set_port(address("1:0:7"), true, false).unwrap());
        assert!(node.set_port(address("0:1:8"), false, true).unwrap());
        assert_eq!(node.page_count(), 2);

        // Same config again is not a change
        assert!(!node.set_port(address("1:0:7"), true, false).unwrap());

        // Reconfiguring keeps the bind index
        assert!(node.set_port(address("1:0:7"), true, true).unwrap());
        let pages: Vec<_> = node.pages().collect();
        assert_eq!(pages[0].0, 1);
        assert_eq!(pages[0].1.len(), 2);
        assert_eq!(pages[1].0, 2);

        assert!(node.is_publisher(address("1:0:7")));
        assert!(!node.is_publisher(address("0:1:8")));
    }

    #[test]
    fn test_remove_port() {
        let mut node = local();
        node.set_port(address("0:0:1"), true, false).unwrap();
        node.set_port(address("0:0:2"), true, false).unwrap();

        assert!(node.set_port(address("0:0:1"), false, false).unwrap());
        assert!(!node.set_port(address("0:0:1"), false, false).unwrap());
        let pages: Vec<_> = node.pages().collect();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].0, 1);
        assert_eq!(pages[0].1, &[Port::input(address("0:0:2"))]);
    }

    #[test]
    fn test_node_report_counts_replies() {
        let mut node = local();
        assert_eq!(node.node_report(), "#0001 [0000] artflow ok");
        node.count_reply();
        node.count_reply();
        assert_eq!(node.node_report(), "#0001 [0002] artflow ok");
    }
}
