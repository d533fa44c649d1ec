//! Transport adapter
//!
//! The engine only ever *sends* through a [`Transport`]; receiving is driven
//! from outside by feeding datagrams to
//! [`ArtNetEngine::handle_datagram`](crate::ArtNetEngine::handle_datagram).
//! Production uses a broadcast-enabled tokio UDP socket, tests use
//! [`MemoryNetwork`].

use std::collections::VecDeque;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::codec::ARTNET_PORT;

/// Outgoing side of an Art-Net socket
pub trait Transport {
    /// Send one datagram without blocking. Art-Net is best-effort: a datagram
    /// that cannot be queued right now is lost, never retried.
    fn send_to(&self, payload: &[u8], target: SocketAddrV4) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send_to(&self, payload: &[u8], target: SocketAddrV4) -> io::Result<()> {
        (**self).send_to(payload, target)
    }
}

/// UDP socket shared with the receive loop
#[derive(Debug, Clone)]
pub struct UdpTransport {
    socket: Arc<tokio::net::UdpSocket>,
}

impl UdpTransport {
    pub fn new(socket: Arc<tokio::net::UdpSocket>) -> Self {
        Self { socket }
    }

    pub fn socket(&self) -> &Arc<tokio::net::UdpSocket> {
        &self.socket
    }
}

impl Transport for UdpTransport {
    fn send_to(&self, payload: &[u8], target: SocketAddrV4) -> io::Result<()> {
        self.socket.try_send_to(payload, target.into()).map(|_| ())
    }
}

/// A datagram in flight on a [`MemoryNetwork`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub source: SocketAddrV4,
    pub target: SocketAddrV4,
    pub payload: Vec<u8>,
}

/// In-process network: every endpoint appends to one shared queue and the
/// test decides who receives what.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    queue: Arc<Mutex<VecDeque<Datagram>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport sending from `ip:6454`
    pub fn endpoint(&self, ip: Ipv4Addr) -> MemoryTransport {
        MemoryTransport {
            local: SocketAddrV4::new(ip, ARTNET_PORT),
            queue: self.queue.clone(),
        }
    }

    pub fn pop(&self) -> Option<Datagram> {
        self.queue.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Take everything queued so far
    pub fn take_all(&self) -> Vec<Datagram> {
        self.queue.lock().drain(..).collect()
    }
}

/// One endpoint of a [`MemoryNetwork`]
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    local: SocketAddrV4,
    queue: Arc<Mutex<VecDeque<Datagram>>>,
}

impl MemoryTransport {
    pub fn local_addr(&self) -> SocketAddrV4 {
        self.local
    }
}

impl Transport for MemoryTransport {
    fn send_to(&self, payload: &[u8], target: SocketAddrV4) -> io::Result<()> {
        self.queue.lock().push_back(Datagram {
            source: self.local,
            target,
            payload: payload.to_vec(),
        });
        Ok(())
    }
}
