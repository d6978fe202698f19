//! In-memory connection used by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use crate::connection::{ConnectionError, PeerConnection};

#[derive(Default)]
pub struct RecordingConnection {
    writes: Mutex<Vec<Bytes>>,
    write_attempts: AtomicUsize,
    keep_alive_calls: Mutex<Vec<(bool, Duration)>>,
    fail_writes: bool,
    keep_alive_unsupported: bool,
}

impl RecordingConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_writes: true,
            ..Self::default()
        })
    }

    pub fn without_keep_alive() -> Arc<Self> {
        Arc::new(Self {
            keep_alive_unsupported: true,
            ..Self::default()
        })
    }

    pub fn writes(&self) -> Vec<Bytes> {
        self.writes.lock().unwrap().clone()
    }

    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    pub fn keep_alive_calls(&self) -> Vec<(bool, Duration)> {
        self.keep_alive_calls.lock().unwrap().clone()
    }
}

impl PeerConnection for RecordingConnection {
    fn write(&self, data: Bytes) -> Result<(), ConnectionError> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(ConnectionError::Closed);
        }
        self.writes.lock().unwrap().push(data);
        Ok(())
    }

    fn set_keep_alive(&self, enabled: bool, interval: Duration) -> Result<(), ConnectionError> {
        self.keep_alive_calls.lock().unwrap().push((enabled, interval));
        if self.keep_alive_unsupported {
            return Err(ConnectionError::KeepAliveUnsupported);
        }
        Ok(())
    }
}
