//! Connection lifecycle — from substrate events to registry entries.
//!
//! Each transport connection is `Established` once accepted and `Closed`
//! when the substrate reports it gone. There is no way back: a peer that
//! drops must come back as a new connection with a new sequence number.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use iris_core::PeerIdentity;
use tokio::sync::{broadcast, mpsc};

use crate::connection::{ConnectionError, ConnectionId, ConnectionInfo, PeerConnection, SwarmEvent};
use crate::registry::{PeerRegistry, Registration};
use crate::sink::{Level, OutputSink};

// ── Keep-alive ────────────────────────────────────────────────────────────────

/// Liveness probes for connections this process dialled.
///
/// Inbound connections are left alone; the side that dialled is the one
/// that keeps the link warm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlivePolicy {
    interval: Duration,
}

impl KeepAlivePolicy {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(600);

    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn applies_to(&self, info: &ConnectionInfo) -> bool {
        info.initiator
    }

    pub fn apply(&self, connection: &dyn PeerConnection) -> Result<(), ConnectionError> {
        connection.set_keep_alive(true, self.interval)
    }
}

impl Default for KeepAlivePolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

// ── Handler ───────────────────────────────────────────────────────────────────

/// State kept for one accepted connection until it closes.
#[derive(Debug)]
pub struct EstablishedConnection {
    peer: PeerIdentity,
    sequence: u64,
    initiator: bool,
}

impl EstablishedConnection {
    pub fn peer(&self) -> &PeerIdentity {
        &self.peer
    }

    /// Sequence number assigned by the registry at acceptance.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn initiator(&self) -> bool {
        self.initiator
    }
}

pub struct ConnectionHandler {
    registry: PeerRegistry,
    sink: Arc<dyn OutputSink>,
    keep_alive: KeepAlivePolicy,
}

impl ConnectionHandler {
    pub fn new(
        registry: PeerRegistry,
        sink: Arc<dyn OutputSink>,
        keep_alive: KeepAlivePolicy,
    ) -> Self {
        Self {
            registry,
            sink,
            keep_alive,
        }
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Wire a new connection into the registry.
    ///
    /// An older connection for the same peer is only displaced, not closed:
    /// it stays up until its own transport closes it, and that close event
    /// then fails the sequence check and leaves the new entry alone. When
    /// both sides dial each other at once, each side may keep a different
    /// connection current, so closing here would tear down both.
    pub fn accept(
        &self,
        connection: Arc<dyn PeerConnection>,
        info: ConnectionInfo,
    ) -> EstablishedConnection {
        if self.keep_alive.applies_to(&info) {
            if let Err(e) = self.keep_alive.apply(connection.as_ref()) {
                tracing::warn!(peer = info.identity.short(), error = %e, "keep-alive not applied");
                self.sink.emit(Level::Error, e.to_string());
            }
        }

        let Registration {
            sequence,
            superseded,
        } = self.registry.register(info.identity.clone(), connection);

        if let Some(old) = superseded {
            tracing::debug!(
                peer = info.identity.short(),
                old_sequence = old.sequence(),
                sequence,
                "connection superseded, left open until its transport closes"
            );
        }

        tracing::info!(
            peer = info.identity.short(),
            sequence,
            initiator = info.initiator,
            peers = self.registry.snapshot_size(),
            "peer connection established"
        );

        EstablishedConnection {
            peer: info.identity,
            sequence,
            initiator: info.initiator,
        }
    }

    pub fn on_data(&self, connection: &EstablishedConnection, payload: &[u8]) {
        self.sink.emit(
            Level::Info,
            format!(
                "From: {} - {}",
                connection.peer,
                String::from_utf8_lossy(payload)
            ),
        );
    }

    /// Retire a closed connection. Returns whether its registry entry
    /// was removed.
    pub fn on_close(&self, connection: EstablishedConnection) -> bool {
        self.sink.emit(
            Level::Info,
            format!(
                "Connection {} closed, peer id: {}",
                connection.sequence, connection.peer
            ),
        );

        let removed = self.registry.unregister(&connection.peer, connection.sequence);
        if removed {
            tracing::info!(
                peer = connection.peer.short(),
                sequence = connection.sequence,
                "peer removed from registry"
            );
        } else {
            tracing::info!(
                peer = connection.peer.short(),
                sequence = connection.sequence,
                current = ?self.registry.sequence_of(&connection.peer),
                "peer entry left intact, superseded by a newer connection"
            );
        }
        removed
    }
}

// ── Event loop ────────────────────────────────────────────────────────────────

/// Drains substrate events through a [`ConnectionHandler`].
///
/// All registry mutations driven by the network happen on this one task.
pub struct SwarmEventLoop {
    handler: ConnectionHandler,
    events: mpsc::Receiver<SwarmEvent>,
    shutdown: broadcast::Receiver<()>,
    live: HashMap<ConnectionId, EstablishedConnection>,
}

impl SwarmEventLoop {
    pub fn new(
        handler: ConnectionHandler,
        events: mpsc::Receiver<SwarmEvent>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            handler,
            events,
            shutdown,
            live: HashMap::new(),
        }
    }

    /// Runs until shutdown or until the substrate drops its event sender.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!(open = self.live.len(), "swarm event loop shutting down");
                    return;
                }

                event = self.events.recv() => {
                    match event {
                        Some(event) => self.handle(event),
                        None => {
                            tracing::info!("swarm event stream ended");
                            return;
                        }
                    }
                }
            }
        }
    }

    fn handle(&mut self, event: SwarmEvent) {
        match event {
            SwarmEvent::Connected {
                id,
                connection,
                info,
            } => {
                let established = self.handler.accept(connection, info);
                if let Some(previous) = self.live.insert(id, established) {
                    tracing::warn!(
                        %id,
                        sequence = previous.sequence,
                        "connection id reused by substrate"
                    );
                }
            }
            SwarmEvent::Data { id, payload } => match self.live.get(&id) {
                Some(conn) => self.handler.on_data(conn, &payload),
                None => tracing::debug!(%id, len = payload.len(), "data for unknown connection"),
            },
            SwarmEvent::Closed { id } => match self.live.remove(&id) {
                Some(conn) => {
                    self.handler.on_close(conn);
                }
                None => tracing::debug!(%id, "close for unknown connection"),
            },
        }
    }
}
