//! The single daemon-wide state value threaded through every method
//! handler, per spec §9's "model as a single daemon context value passed
//! through all handlers rather than ambient globals."

use crate::blob::BlobStore;
use crate::peer::PeerTable;

/// Owns the blob store and peer table. Lives for the whole process; there is
/// exactly one instance, constructed once in `main` and handed to the
/// dispatcher. No internal locking — the event loop that owns it is
/// single-threaded (spec §5).
#[derive(Default)]
pub struct DaemonContext {
    /// Content-addressed blob table.
    pub blobs: BlobStore,
    /// Per-sender handle tables and apparent-size accounting.
    pub peers: PeerTable,
}

impl DaemonContext {
    /// Construct an empty context (no blobs, no peers).
    pub fn new() -> Self {
        Self::default()
    }

    /// `real_size`: bytes actually resident (sum over live blobs).
    pub fn real_size(&self) -> u64 {
        self.blobs.real_size()
    }

    /// `apparent_size`: bytes callers would have spent without dedup.
    pub fn apparent_size(&self) -> u64 {
        self.peers.apparent_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apparent_size_is_never_less_than_real_size() {
        // Invariant 3 (spec §8): apparent_size >= real_size always holds,
        // since every live blob byte is backed by at least one peer entry
        // of at least that many bytes.
        let ctx = DaemonContext::new();
        assert!(ctx.apparent_size() >= ctx.real_size());
    }
}
