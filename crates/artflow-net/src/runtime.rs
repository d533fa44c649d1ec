//! Async driver for [`ArtNetEngine`]
//!
//! Binds the Art-Net UDP socket and runs one tokio task that feeds the
//! engine received datagrams and both timer ticks. The engine sits behind a
//! mutex so the application can call into it from any thread; every call
//! holds the lock only for the duration of one engine operation.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::codec::{NodeStyle, DMX_UNIVERSE_SIZE};
use crate::config::ArtNetConfig;
use crate::engine::ArtNetEngine;
use crate::events::EngineEvent;
use crate::node::Node;
use crate::port_address::{PortAddress, UniverseKey};
use crate::transport::UdpTransport;
use crate::Result;

/// Largest datagram we expect (ArtDmx is 530 bytes)
const RECV_BUFFER_SIZE: usize = 1500;

type SharedEngine = Arc<Mutex<ArtNetEngine<UdpTransport>>>;

/// A running Art-Net node
pub struct ArtNetRuntime {
    engine: SharedEngine,
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ArtNetRuntime {
    /// Bind `0.0.0.0:6454` with broadcast enabled and start with default
    /// settings for the given interface
    pub async fn connect(broadcast_ip: Ipv4Addr, unicast_ip: Ipv4Addr) -> Result<Self> {
        Self::start(ArtNetConfig::new(broadcast_ip, unicast_ip)).await
    }

    /// Bind the socket, build the engine and spawn the event loop.
    ///
    /// Unless the config starts passive, the node announces itself once
    /// before the first poll goes out.
    pub async fn start(config: ArtNetConfig) -> Result<Self> {
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port)).await?;
        socket.set_broadcast(true)?;
        let local_addr = socket.local_addr()?;
        let socket = Arc::new(socket);

        let mut engine = ArtNetEngine::new(&config, UdpTransport::new(socket.clone()))?;
        if !config.passive {
            engine.announce();
        }
        let engine = Arc::new(Mutex::new(engine));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run(
            engine.clone(),
            socket,
            config.poll_interval(),
            config.dmx_tick(),
            shutdown_rx,
        ));

        tracing::info!("Art-Net runtime listening on {}", local_addr);

        Ok(Self {
            engine,
            local_addr,
            shutdown_tx,
            task: Some(task),
        })
    }

    /// Address the socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn set_port_config<K: UniverseKey>(
        &self,
        key: K,
        is_input: bool,
        is_output: bool,
    ) -> Result<PortAddress> {
        self.engine.lock().set_port_config(key, is_input, is_output)
    }

    pub fn set_dmx<K: UniverseKey>(&self, key: K, data: &[u8]) -> Result<()> {
        self.engine.lock().set_dmx(key, data)
    }

    pub fn get_nodes(&self) -> Vec<Node> {
        self.engine.lock().get_nodes()
    }

    pub fn universe_data<K: UniverseKey>(&self, key: K) -> Result<[u8; DMX_UNIVERSE_SIZE]> {
        self.engine.lock().universe_data(key)
    }

    pub fn set_short_name(&self, name: &str) {
        self.engine.lock().set_short_name(name);
    }

    pub fn set_long_name(&self, name: &str) {
        self.engine.lock().set_long_name(name);
    }

    pub fn set_style(&self, style: NodeStyle) {
        self.engine.lock().set_style(style);
    }

    pub fn set_passive(&self, passive: bool) {
        self.engine.lock().set_passive(passive);
    }

    pub fn events(&self) -> Receiver<EngineEvent> {
        self.engine.lock().events()
    }

    pub fn dmx_events(&self) -> Receiver<EngineEvent> {
        self.engine.lock().dmx_events()
    }

    /// Run `f` with the engine locked, for reads the wrappers above don't cover
    pub fn with_engine<R>(&self, f: impl FnOnce(&ArtNetEngine<UdpTransport>) -> R) -> R {
        f(&self.engine.lock())
    }

    /// Stop the event loop and wait for it to finish. The socket is closed
    /// once the last handle to it is dropped.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Art-Net task ended abnormally: {}", e);
            }
        }
        tracing::info!("Art-Net runtime on {} stopped", self.local_addr);
    }
}

impl Drop for ArtNetRuntime {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    engine: SharedEngine,
    socket: Arc<UdpSocket>,
    poll_every: Duration,
    dmx_every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    let mut poll = tokio::time::interval(poll_every);
    let mut dmx = tokio::time::interval(dmx_every);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    dmx.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            res = socket.recv_from(&mut buf) => {
                match res {
                    Ok((len, SocketAddr::V4(source))) => {
                        engine.lock().handle_datagram(&buf[..len], source, Instant::now());
                    }
                    Ok((_, source)) => {
                        tracing::trace!("Ignoring IPv6 datagram from {}", source);
                    }
                    Err(e) => {
                        // ICMP errors surface here on some platforms
                        tracing::debug!("Art-Net receive error: {}", e);
                    }
                }
            }
            _ = poll.tick() => {
                engine.lock().poll_tick(Instant::now());
            }
            _ = dmx.tick() => {
                engine.lock().dmx_tick(Instant::now());
            }
            _ = shutdown.changed() => {
                break;
            }
        }
    }
}
