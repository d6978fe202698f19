//! Static-bootstrap TCP swarm.
//!
//! Stands in for a rendezvous-based discovery substrate. It listens on a
//! TCP port, dials configured addresses, and after a hello exchange
//! reports each connection to the lifecycle loop as `SwarmEvent`s:
//! `Connected` once, then `Data` for every read, then `Closed`.
//!
//! The dialling side is the initiator. Dial targets are redialled after
//! a disconnect or a failed attempt.

mod connection;
pub mod hello;

pub use connection::TcpConnection;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use iris_core::wire::{channel_topic, Hello, Topic, HELLO_TIMEOUT_SECS};
use iris_core::PeerIdentity;
use iris_services::{ConnectionId, ConnectionInfo, SwarmEvent};

/// Capacity of the event channel to the lifecycle loop.
pub const EVENT_QUEUE_LEN: usize = 256;

const READ_BUF_LEN: usize = 4096;

struct Shared {
    identity: PeerIdentity,
    topic: OnceLock<Topic>,
    events: mpsc::Sender<SwarmEvent>,
    next_id: AtomicU64,
}

/// Handle to the swarm. Cheap to clone.
#[derive(Clone)]
pub struct Swarm {
    shared: Arc<Shared>,
    redial_interval: Duration,
}

impl Swarm {
    /// Create a swarm for `identity`. Events for every connection arrive on
    /// the returned receiver.
    pub fn configure(identity: PeerIdentity) -> (Self, mpsc::Receiver<SwarmEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_LEN);
        let swarm = Self {
            shared: Arc::new(Shared {
                identity,
                topic: OnceLock::new(),
                events: tx,
                next_id: AtomicU64::new(0),
            }),
            redial_interval: Duration::from_secs(3),
        };
        (swarm, rx)
    }

    pub fn with_redial_interval(mut self, interval: Duration) -> Self {
        self.redial_interval = interval;
        self
    }

    /// Bind the listen port and start accepting. Returns the bound port.
    ///
    /// Connections accepted before [`Swarm::join`] are dropped.
    pub async fn listen(&self, port: u16) -> Result<u16> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("failed to bind listen port {port}"))?;
        let bound = listener.local_addr()?.port();
        tracing::info!(port = bound, "swarm listening");
        tokio::spawn(accept_loop(self.shared.clone(), listener));
        Ok(bound)
    }

    /// Join a channel. Only the first call takes effect; returns whether
    /// this call did.
    pub fn join(&self, channel: &str) -> bool {
        let joined = self.shared.topic.set(channel_topic(channel)).is_ok();
        if joined {
            tracing::info!(channel, "joined channel");
        } else {
            tracing::warn!(channel, "already joined a channel, ignoring");
        }
        joined
    }

    /// Keep a connection to `addr` up, redialling whenever it drops.
    pub fn dial(&self, addr: String) {
        tokio::spawn(dial_loop(self.shared.clone(), addr, self.redial_interval));
    }
}

async fn accept_loop(shared: Arc<Shared>, listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((stream, remote)) => {
                tracing::debug!(%remote, "inbound connection");
                let shared = shared.clone();
                tokio::spawn(async move {
                    if let Err(e) = drive(shared, stream, remote, false).await {
                        tracing::debug!(%remote, error = %e, "inbound connection ended");
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
        if shared.events.is_closed() {
            tracing::info!("event loop gone, accept loop exiting");
            return;
        }
    }
}

async fn dial_loop(shared: Arc<Shared>, addr: String, interval: Duration) {
    loop {
        match TcpStream::connect(addr.as_str()).await {
            Ok(stream) => {
                let remote = match stream.peer_addr() {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::debug!(addr, error = %e, "dialled socket has no peer address");
                        tokio::time::sleep(interval).await;
                        continue;
                    }
                };
                tracing::debug!(%remote, "outbound connection");
                if let Err(e) = drive(shared.clone(), stream, remote, true).await {
                    tracing::debug!(%remote, error = %e, "outbound connection ended");
                }
            }
            Err(e) => tracing::debug!(addr, error = %e, "dial failed"),
        }
        if shared.events.is_closed() {
            return;
        }
        tokio::time::sleep(interval).await;
    }
}

/// Run one connection from hello to close.
async fn drive(
    shared: Arc<Shared>,
    mut stream: TcpStream,
    remote: SocketAddr,
    initiator: bool,
) -> Result<()> {
    let topic = *shared.topic.get().context("not joined to a channel")?;
    let ours = Hello::new(topic, shared.identity.clone());

    let theirs = tokio::time::timeout(
        Duration::from_secs(HELLO_TIMEOUT_SECS),
        hello::exchange(&mut stream, &ours),
    )
    .await
    .context("hello timed out")??;

    if theirs.topic != topic {
        bail!("peer is on a different channel");
    }
    if theirs.identity == shared.identity {
        bail!("connected to ourselves");
    }

    let options = TcpConnection::option_handle(&stream).context("duplicate socket")?;
    let (mut reader, writer) = stream.into_split();
    let connection = TcpConnection::spawn(remote, writer, options);
    let id = ConnectionId(shared.next_id.fetch_add(1, Ordering::SeqCst));

    tracing::debug!(%remote, %id, peer = theirs.identity.short(), initiator, "hello complete");

    let info = ConnectionInfo {
        identity: theirs.identity,
        initiator,
    };
    if shared
        .events
        .send(SwarmEvent::Connected {
            id,
            connection: connection.clone(),
            info,
        })
        .await
        .is_err()
    {
        connection.close();
        bail!("event loop gone");
    }

    let mut buf = vec![0u8; READ_BUF_LEN];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let payload = Bytes::copy_from_slice(&buf[..n]);
                if shared.events.send(SwarmEvent::Data { id, payload }).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(%remote, %id, error = %e, "read failed");
                break;
            }
        }
    }

    // Our side goes down with the read side.
    connection.close();
    let _ = shared.events.send(SwarmEvent::Closed { id }).await;
    Ok(())
}
