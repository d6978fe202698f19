//! iris-services — peer registry, connection lifecycle, and broadcast.
//!
//! Nothing in this crate touches a socket. Transports plug in through
//! [`PeerConnection`] and feed [`SwarmEvent`]s to the lifecycle loop.

pub mod connection;
pub mod dispatch;
pub mod lifecycle;
pub mod registry;
pub mod sink;

pub use connection::{ConnectionError, ConnectionId, ConnectionInfo, PeerConnection, SwarmEvent};
pub use dispatch::BroadcastDispatcher;
pub use lifecycle::{ConnectionHandler, EstablishedConnection, KeepAlivePolicy, SwarmEventLoop};
pub use registry::{ConnectionRecord, PeerRegistry, Registration};
pub use sink::{ChannelSink, Level, OutputLine, OutputSink};

#[cfg(test)]
pub(crate) mod test_support;
