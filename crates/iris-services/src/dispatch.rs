//! Broadcast dispatch — sends locally typed text to every registered peer.

use bytes::Bytes;

use crate::registry::PeerRegistry;

/// Fan-out of local messages over the peer registry.
///
/// No framing and no acknowledgment: each registered connection gets one
/// write per message. Peers that register after a dispatch starts may or
/// may not receive that message.
#[derive(Clone)]
pub struct BroadcastDispatcher {
    registry: PeerRegistry,
}

impl BroadcastDispatcher {
    pub fn new(registry: PeerRegistry) -> Self {
        Self { registry }
    }

    /// Returns false if the message was empty and nothing was sent.
    pub fn dispatch(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        tracing::debug!(
            peers = self.registry.snapshot_size(),
            len = text.len(),
            "dispatching message"
        );
        self.registry.broadcast(Bytes::copy_from_slice(text.as_bytes()));
        true
    }
}
