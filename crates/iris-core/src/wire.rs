//! Iris wire format — the hello exchanged when a TCP connection opens.
//!
//! Both sides send a hello before any chat bytes. After the hello the
//! stream carries raw message text with no framing.
//!
//!   [ topic: 32 bytes ][ id_len: u8 ][ identity: id_len bytes ]
//!
//! The topic is BLAKE3(channel name). Peers on different channels drop
//! each other's connections after reading the hello.

use thiserror::Error;

use crate::identity::PeerIdentity;

/// Channel identifier — BLAKE3 hash of the channel name.
pub type Topic = [u8; 32];

/// Fixed-size prefix of a hello: topic plus the identity length byte.
pub const HELLO_HEADER_LEN: usize = 33;

/// Maximum identity length that fits in the length byte.
pub const MAX_IDENTITY_LEN: usize = u8::MAX as usize;

/// Seconds a peer has to complete its hello before the socket is dropped.
pub const HELLO_TIMEOUT_SECS: u64 = 10;

/// Default channel, shared by every Iris peer unless configured otherwise.
pub const DEFAULT_CHANNEL: &str = "p2piris-swarm";

/// Compute the topic for a channel name.
pub fn channel_topic(channel: &str) -> Topic {
    *blake3::hash(channel.as_bytes()).as_bytes()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("hello truncated: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
    #[error("hello carries an empty identity")]
    EmptyIdentity,
    #[error("identity too long: {0} bytes")]
    IdentityTooLong(usize),
}

/// The opening message on every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    pub topic: Topic,
    pub identity: PeerIdentity,
}

impl Hello {
    pub fn new(topic: Topic, identity: PeerIdentity) -> Self {
        Self { topic, identity }
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let id = self.identity.as_bytes();
        if id.is_empty() {
            return Err(WireError::EmptyIdentity);
        }
        if id.len() > MAX_IDENTITY_LEN {
            return Err(WireError::IdentityTooLong(id.len()));
        }
        let mut out = Vec::with_capacity(HELLO_HEADER_LEN + id.len());
        out.extend_from_slice(&self.topic);
        out.push(id.len() as u8);
        out.extend_from_slice(id);
        Ok(out)
    }

    /// Parse the fixed header. Returns the topic and how many identity
    /// bytes follow, so a stream reader knows how much more to read.
    pub fn decode_header(buf: &[u8]) -> Result<(Topic, usize), WireError> {
        if buf.len() < HELLO_HEADER_LEN {
            return Err(WireError::Truncated {
                need: HELLO_HEADER_LEN,
                have: buf.len(),
            });
        }
        let mut topic = [0u8; 32];
        topic.copy_from_slice(&buf[..32]);
        let id_len = buf[32] as usize;
        if id_len == 0 {
            return Err(WireError::EmptyIdentity);
        }
        Ok((topic, id_len))
    }

    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let (topic, id_len) = Self::decode_header(buf)?;
        let need = HELLO_HEADER_LEN + id_len;
        if buf.len() < need {
            return Err(WireError::Truncated {
                need,
                have: buf.len(),
            });
        }
        Ok(Self {
            topic,
            identity: PeerIdentity::from_bytes(&buf[HELLO_HEADER_LEN..need]),
        })
    }
}
