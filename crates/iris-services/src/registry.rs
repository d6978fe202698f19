//! Peer registry — which connection currently represents each peer.
//!
//! Every accepted connection gets a sequence number from one process-wide
//! counter. A peer maps to the record of its newest accepted connection;
//! a close only removes the entry if it carries the sequence number that
//! is still stored, so a late close from a superseded connection cannot
//! evict the live one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use iris_core::PeerIdentity;

use crate::connection::PeerConnection;

/// The connection currently designated for a peer.
#[derive(Clone)]
pub struct ConnectionRecord {
    peer: PeerIdentity,
    connection: Arc<dyn PeerConnection>,
    sequence: u64,
}

impl ConnectionRecord {
    pub fn new(peer: PeerIdentity, connection: Arc<dyn PeerConnection>, sequence: u64) -> Self {
        Self {
            peer,
            connection,
            sequence,
        }
    }

    pub fn peer(&self) -> &PeerIdentity {
        &self.peer
    }

    pub fn connection(&self) -> &Arc<dyn PeerConnection> {
        &self.connection
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl std::fmt::Debug for ConnectionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRecord")
            .field("peer", &self.peer)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

/// Result of [`PeerRegistry::register`].
///
/// The registry never closes a record it replaces; it hands it back to the
/// caller along with the new sequence number.
#[must_use]
#[derive(Debug)]
pub struct Registration {
    pub sequence: u64,
    pub superseded: Option<ConnectionRecord>,
}

/// The peer registry — shared between the lifecycle loop and the input loop.
///
/// Cloning is cheap; clones share the same map and counter.
#[derive(Clone, Default)]
pub struct PeerRegistry {
    entries: Arc<DashMap<PeerIdentity, ConnectionRecord>>,
    next_sequence: Arc<AtomicU64>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `connection` the designated connection for `peer`.
    ///
    /// The sequence number is allocated while the entry's shard lock is
    /// held, so concurrent registrations for one peer always leave the
    /// highest sequence stored.
    pub fn register(
        &self,
        peer: PeerIdentity,
        connection: Arc<dyn PeerConnection>,
    ) -> Registration {
        match self.entries.entry(peer) {
            Entry::Occupied(mut slot) => {
                let sequence = self.allocate_sequence();
                let record = ConnectionRecord::new(slot.key().clone(), connection, sequence);
                let previous = slot.insert(record);
                Registration {
                    sequence,
                    superseded: Some(previous),
                }
            }
            Entry::Vacant(slot) => {
                let sequence = self.allocate_sequence();
                let record = ConnectionRecord::new(slot.key().clone(), connection, sequence);
                slot.insert(record);
                Registration {
                    sequence,
                    superseded: None,
                }
            }
        }
    }

    /// Remove `peer` only if its stored record carries `sequence`.
    ///
    /// Returns false when the entry was already superseded or absent.
    pub fn unregister(&self, peer: &PeerIdentity, sequence: u64) -> bool {
        self.entries
            .remove_if(peer, |_, record| record.sequence == sequence)
            .is_some()
    }

    /// Write `message` to every registered connection.
    ///
    /// Works on a snapshot taken at call time. A failed write is logged and
    /// skipped; it never stops delivery to the remaining peers.
    pub fn broadcast(&self, message: Bytes) {
        let snapshot: Vec<ConnectionRecord> =
            self.entries.iter().map(|e| e.value().clone()).collect();

        let mut failed = 0usize;
        for record in &snapshot {
            if let Err(e) = record.connection.write(message.clone()) {
                failed += 1;
                tracing::warn!(
                    peer = record.peer.short(),
                    sequence = record.sequence,
                    error = %e,
                    "broadcast write failed"
                );
            }
        }

        tracing::debug!(
            peers = snapshot.len(),
            failed,
            bytes = message.len(),
            "broadcast complete"
        );
    }

    /// Number of live entries.
    pub fn snapshot_size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sequence number currently stored for `peer`.
    pub fn sequence_of(&self, peer: &PeerIdentity) -> Option<u64> {
        self.entries.get(peer).map(|e| e.sequence)
    }

    pub fn peers(&self) -> Vec<PeerIdentity> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    fn allocate_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::SeqCst)
    }
}
