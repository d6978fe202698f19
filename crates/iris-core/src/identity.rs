//! Peer identities.
//!
//! The local identity is 32 random bytes generated once per process.
//! Remote identities arrive from the discovery substrate and may be any
//! non-empty length. Identities are compared by their bytes, which is the
//! same as comparing their lowercase hex renderings.

use std::fmt;

use rand::RngCore;

/// Length of a locally generated identity.
pub const IDENTITY_LEN: usize = 32;

/// An opaque peer identifier, displayed as lowercase hex.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerIdentity(Vec<u8>);

impl PeerIdentity {
    /// Generate a fresh local identity from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; IDENTITY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wrap identity bytes reported by a remote peer.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse a hex-encoded identity.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(s).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex rendering, used as the display and lookup form.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// First 8 bytes as hex, for compact log fields.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..self.0.len().min(8)])
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerIdentity({})", self.short())
    }
}
