//! The transport seam — what the lifecycle needs from a connection, and
//! the events a discovery substrate emits about its connections.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use iris_core::PeerIdentity;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection closed")]
    Closed,
    #[error("keep-alive not supported by this transport")]
    KeepAliveUnsupported,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A live bidirectional byte stream to one remote peer.
///
/// Implementations must not block: `write` hands the bytes to the
/// transport and returns. Reads and teardown are not part of this trait;
/// the substrate reports inbound bytes and closes as [`SwarmEvent`]s.
pub trait PeerConnection: Send + Sync {
    fn write(&self, data: Bytes) -> Result<(), ConnectionError>;

    /// Enable or disable periodic liveness probes.
    fn set_keep_alive(&self, enabled: bool, interval: Duration) -> Result<(), ConnectionError>;
}

/// Metadata the substrate reports with each new connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub identity: PeerIdentity,
    /// True if this process dialled the connection.
    pub initiator: bool,
}

/// Substrate-assigned token for one transport connection.
///
/// Distinct from the registry's sequence number, which the substrate
/// never sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything the substrate can tell us about its connections.
pub enum SwarmEvent {
    Connected {
        id: ConnectionId,
        connection: Arc<dyn PeerConnection>,
        info: ConnectionInfo,
    },
    Data {
        id: ConnectionId,
        payload: Bytes,
    },
    Closed {
        id: ConnectionId,
    },
}

impl fmt::Debug for SwarmEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwarmEvent::Connected { id, info, .. } => f
                .debug_struct("Connected")
                .field("id", id)
                .field("info", info)
                .finish_non_exhaustive(),
            SwarmEvent::Data { id, payload } => f
                .debug_struct("Data")
                .field("id", id)
                .field("len", &payload.len())
                .finish(),
            SwarmEvent::Closed { id } => f.debug_struct("Closed").field("id", id).finish(),
        }
    }
}
