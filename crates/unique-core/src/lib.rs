//! Content-addressed blob store and peer-reference accounting backing the
//! `unique-daemon` session dedup service.
//!
//! This crate owns everything spec §3/§4.1/§4.2 calls "core": the
//! content-addressed table of sealed fds, the per-sender handle tables, and
//! the combined daemon context. It has no notion of D-Bus or sockets at
//! all — `unique-daemon` wires this up to a real bus connection, which
//! keeps these types trivially unit-testable without a running session bus.

#![warn(missing_docs)]

mod blob;
mod context;
mod digest;
mod error;
mod peer;

pub use blob::{BlobHandle, BlobStore};
pub use context::DaemonContext;
pub use digest::{Digest, DigestHasher};
pub use error::{Error, Result};
pub use peer::{Handle, Peer, PeerTable};
