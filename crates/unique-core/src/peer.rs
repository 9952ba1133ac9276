//! Per-sender handle tables.
//!
//! One `Peer` exists per connected bus sender (e.g. `:1.42`); it owns a
//! dense, monotonically increasing set of 32-bit handles, each pointing at
//! one `BlobHandle` the peer is keeping the corresponding blob alive on
//! behalf of.

use crate::blob::{BlobHandle, BlobStore};
use std::collections::HashMap;
use tracing::debug;

/// A daemon-assigned reference a peer holds to one blob.
pub type Handle = u32;

/// One connected sender's outstanding blob references.
#[derive(Default)]
pub struct Peer {
    next_handle: Handle,
    refs: HashMap<Handle, BlobHandle>,
}

impl Peer {
    fn new() -> Self {
        // Handles start at 1; 0 is reserved (client-side mapping records use
        // it to mean "no handle assigned yet", per spec §3).
        Self { next_handle: 1, refs: HashMap::new() }
    }
}

/// The daemon-wide map from sender name to `Peer`, plus the apparent-size
/// counter (§3's "cumulative bytes callers would have spent without
/// dedup").
#[derive(Default)]
pub struct PeerTable {
    peers: HashMap<String, Peer>,
    apparent_size: u64,
}

impl PeerTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the peer for `sender`, creating it lazily on first contact.
    pub fn get_or_create(&mut self, sender: &str) -> &mut Peer {
        self.peers.entry(sender.to_owned()).or_insert_with(Peer::new)
    }

    /// Mint a new handle for `sender` pointing at `blob`, bumping apparent
    /// size by the blob's length.
    pub fn add(&mut self, sender: &str, blob: BlobHandle) -> Handle {
        self.apparent_size += blob.len;
        let peer = self.get_or_create(sender);
        let handle = peer.next_handle;
        peer.next_handle += 1;
        peer.refs.insert(handle, blob);
        debug!(sender, handle, apparent_size = self.apparent_size, "handle minted");
        handle
    }

    /// Drop `sender`'s reference for `handle`, releasing it from `store` and
    /// decrementing apparent size. Unknown peer/handle pairs are a no-op —
    /// this absorbs duplicate `Forget`s after peer death has already swept
    /// them, per spec §4.2.
    pub fn remove(&mut self, store: &mut BlobStore, sender: &str, handle: Handle) {
        let Some(peer) = self.peers.get_mut(sender) else { return };
        let Some(blob) = peer.refs.remove(&handle) else { return };
        self.apparent_size = self.apparent_size.saturating_sub(blob.len);
        store.release(&blob);
        debug!(sender, handle, apparent_size = self.apparent_size, "handle forgotten");
    }

    /// Remove `sender` entirely, releasing every reference it held. Called
    /// on `NameOwnerChanged` teardown and on daemon exit.
    pub fn drop_peer(&mut self, store: &mut BlobStore, sender: &str) {
        let Some(peer) = self.peers.remove(sender) else { return };
        let released = peer.refs.len();
        for (_, blob) in peer.refs {
            self.apparent_size = self.apparent_size.saturating_sub(blob.len);
            store.release(&blob);
        }
        debug!(sender, released, apparent_size = self.apparent_size, "peer dropped");
    }

    /// Current apparent-size counter.
    pub fn apparent_size(&self) -> u64 {
        self.apparent_size
    }

    /// True if `sender` holds `handle` (used by tests to check teardown).
    #[cfg(test)]
    fn has_handle(&self, sender: &str, handle: Handle) -> bool {
        self.peers.get(sender).is_some_and(|p| p.refs.contains_key(&handle))
    }
}
