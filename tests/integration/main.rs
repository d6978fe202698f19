//! Iris integration test harness.
//!
//! Drives the registry, lifecycle loop and dispatcher together through an
//! in-memory substrate. No sockets are opened here; the TCP swarm has its
//! own tests inside irisd.
//!
//!   cargo test --test integration

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::sync::{broadcast, mpsc};

use iris_core::PeerIdentity;
use iris_services::{
    ChannelSink, ConnectionError, ConnectionHandler, ConnectionId, ConnectionInfo, KeepAlivePolicy,
    OutputLine, PeerConnection, PeerRegistry, SwarmEvent, SwarmEventLoop,
};

mod broadcast_fanout;
mod lifecycle;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Connection that records what it is asked to do.
#[derive(Default)]
pub struct FakeConnection {
    writes: Mutex<Vec<Bytes>>,
    keep_alive: Mutex<Vec<(bool, Duration)>>,
    broken: bool,
}

impl FakeConnection {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every write fails as if the transport were gone.
    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            broken: true,
            ..Self::default()
        })
    }

    pub fn writes(&self) -> Vec<Bytes> {
        self.writes.lock().unwrap().clone()
    }

    pub fn keep_alive_calls(&self) -> Vec<(bool, Duration)> {
        self.keep_alive.lock().unwrap().clone()
    }
}

impl PeerConnection for FakeConnection {
    fn write(&self, data: Bytes) -> Result<(), ConnectionError> {
        if self.broken {
            return Err(ConnectionError::Closed);
        }
        self.writes.lock().unwrap().push(data);
        Ok(())
    }

    fn set_keep_alive(&self, enabled: bool, interval: Duration) -> Result<(), ConnectionError> {
        self.keep_alive.lock().unwrap().push((enabled, interval));
        Ok(())
    }
}

/// A running lifecycle loop fed by hand.
pub struct Node {
    pub registry: PeerRegistry,
    events: mpsc::Sender<SwarmEvent>,
    output: mpsc::UnboundedReceiver<OutputLine>,
    next_id: AtomicU64,
    // Dropping the sender would stop the loop.
    _shutdown: broadcast::Sender<()>,
}

impl Node {
    pub fn start() -> Self {
        let registry = PeerRegistry::new();
        let (sink, output) = ChannelSink::new();
        let handler =
            ConnectionHandler::new(registry.clone(), Arc::new(sink), KeepAlivePolicy::default());
        let (events_tx, events_rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(SwarmEventLoop::new(handler, events_rx, shutdown_rx).run());
        Self {
            registry,
            events: events_tx,
            output,
            next_id: AtomicU64::new(0),
            _shutdown: shutdown_tx,
        }
    }

    /// Report a new connection and return its substrate id.
    pub async fn connect(
        &self,
        identity: &PeerIdentity,
        connection: Arc<dyn PeerConnection>,
        initiator: bool,
    ) -> Result<ConnectionId> {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let info = ConnectionInfo {
            identity: identity.clone(),
            initiator,
        };
        self.events
            .send(SwarmEvent::Connected { id, connection, info })
            .await
            .context("event loop gone")?;
        Ok(id)
    }

    pub async fn data(&self, id: ConnectionId, payload: &'static [u8]) -> Result<()> {
        self.events
            .send(SwarmEvent::Data {
                id,
                payload: Bytes::from_static(payload),
            })
            .await
            .context("event loop gone")
    }

    pub async fn close(&self, id: ConnectionId) -> Result<()> {
        self.events
            .send(SwarmEvent::Closed { id })
            .await
            .context("event loop gone")
    }

    /// Next line the node would print.
    pub async fn next_line(&mut self) -> Result<String> {
        let line = tokio::time::timeout(Duration::from_secs(5), self.output.recv())
            .await
            .context("timed out waiting for output")?
            .context("output sink closed")?;
        Ok(line.to_string())
    }

    /// Wait until every event sent so far has been handled, using a data
    /// event on `id` as a barrier.
    pub async fn settle(&mut self, id: ConnectionId) -> Result<()> {
        self.data(id, b"__barrier__").await?;
        loop {
            if self.next_line().await?.ends_with("__barrier__") {
                return Ok(());
            }
        }
    }
}

pub fn peer(n: u8) -> PeerIdentity {
    PeerIdentity::from_bytes(vec![n; 32])
}
