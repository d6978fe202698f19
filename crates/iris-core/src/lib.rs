//! iris-core — peer identity, hello wire format, and configuration.
//! The other Iris crates depend on this one.

pub mod config;
pub mod identity;
pub mod wire;

pub use identity::PeerIdentity;
