//! Engine notifications
//!
//! Node and port changes are pushed into a bounded channel the application
//! drains at its own pace. Received DMX frames go to a second channel of
//! their own, so a busy universe can never crowd out discovery events. A
//! full channel drops the event rather than stalling the receive path.

use std::net::Ipv4Addr;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::Serialize;

use crate::node::Port;
use crate::port_address::PortAddress;

/// Something changed in the engine's view of the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// First reply from an IP
    NodeDiscovered {
        ip: Ipv4Addr,
        short_name: String,
        long_name: String,
    },
    /// Known IP announced different identity fields
    NodeReplaced {
        ip: Ipv4Addr,
        short_name: String,
        long_name: String,
    },
    /// Ports of one bind page changed
    PortsChanged {
        ip: Ipv4Addr,
        bind_index: u8,
        added: Vec<Port>,
        removed: Vec<Port>,
    },
    /// Node stopped replying and was forgotten
    NodeLost { ip: Ipv4Addr },
    /// A DMX frame was stored. Delivered on the DMX channel only.
    DmxReceived {
        address: PortAddress,
        source: Ipv4Addr,
        length: usize,
    },
}

impl EngineEvent {
    fn is_dmx(&self) -> bool {
        matches!(self, EngineEvent::DmxReceived { .. })
    }
}

/// Bounded event channels owned by the engine
#[derive(Debug)]
pub(crate) struct EventQueue {
    tx: Sender<EngineEvent>,
    rx: Receiver<EngineEvent>,
    dmx_tx: Sender<EngineEvent>,
    dmx_rx: Receiver<EngineEvent>,
    dropped: u64,
}

impl EventQueue {
    /// Both channels get `capacity` slots
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        let (dmx_tx, dmx_rx) = bounded(capacity);
        Self {
            tx,
            rx,
            dmx_tx,
            dmx_rx,
            dropped: 0,
        }
    }

    pub fn push(&mut self, event: EngineEvent) {
        let tx = if event.is_dmx() { &self.dmx_tx } else { &self.tx };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.dropped += 1;
                tracing::debug!("Event queue full, dropping {:?}", event);
            }
            // We hold a receiver ourselves, so this cannot happen
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Node and port events
    pub fn receiver(&self) -> Receiver<EngineEvent> {
        self.rx.clone()
    }

    /// [`EngineEvent::DmxReceived`] only
    pub fn dmx_receiver(&self) -> Receiver<EngineEvent> {
        self.dmx_rx.clone()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_queue_drops() {
        let mut queue = EventQueue::new(1);
        let rx = queue.receiver();
        let lost = |n| EngineEvent::NodeLost {
            ip: Ipv4Addr::new(10, 0, 0, n),
        };

        queue.push(lost(1));
        queue.push(lost(2));
        assert_eq!(queue.dropped(), 1);
        assert_eq!(rx.try_recv().unwrap(), lost(1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dmx_events_use_their_own_channel() {
        let mut queue = EventQueue::new(2);
        let rx = queue.receiver();
        let dmx_rx = queue.dmx_receiver();
        let frame = EngineEvent::DmxReceived {
            address: PortAddress::from_raw(1).unwrap(),
            source: Ipv4Addr::new(10, 0, 0, 9),
            length: 512,
        };

        for _ in 0..5 {
            queue.push(frame.clone());
        }
        queue.push(EngineEvent::NodeLost {
            ip: Ipv4Addr::new(10, 0, 0, 9),
        });

        assert_eq!(queue.dropped(), 3);
        assert_eq!(dmx_rx.try_iter().count(), 2);
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![EngineEvent::NodeLost {
                ip: Ipv4Addr::new(10, 0, 0, 9)
            }]
        );
    }

    #[test]
    fn test_event_json() {
        let event = EngineEvent::NodeLost {
            ip: Ipv4Addr::new(10, 0, 0, 9),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"event":"node_lost","ip":"10.0.0.9"}"#);
    }
}
