//! Content-addressed table of sealed blob descriptors.
//!
//! Digest-keyed, idempotent on duplicate content, a pure in-memory table
//! of refcounted file descriptors — there is nothing to persist or encrypt
//! here, the daemon's whole job is to keep identical content behind one
//! shared, kernel-backed page-cache entry while it is alive. The store
//! runs single-threaded (§5), so refcounts are plain `u32`s with no
//! locking.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::os::fd::OwnedFd;
use tracing::debug;

/// An opaque, cheaply-cloneable reference to one blob, returned by
/// `lookup`/`insert` and consumed by `release`. Carries the blob's length
/// so callers (the peer table, size accounting) don't need a second lookup.
#[derive(Clone)]
pub struct BlobHandle {
    digest_hex: String,
    /// Length in bytes of the referenced blob's content.
    pub len: u64,
}

impl BlobHandle {
    /// The lowercase hex digest this handle points at.
    pub fn digest_hex(&self) -> &str {
        &self.digest_hex
    }
}

struct Blob {
    fd: OwnedFd,
    len: u64,
    refcount: u32,
}

/// The daemon's sole owner of blob records. Peers never see a `Blob`
/// directly — only `BlobHandle`s minted by `lookup`/`insert`.
#[derive(Default)]
pub struct BlobStore {
    blobs: HashMap<String, Blob>,
}

impl BlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an existing blob by hex digest, bumping its refcount on hit.
    pub fn lookup(&mut self, digest_hex: &str) -> Option<BlobHandle> {
        let blob = self.blobs.get_mut(digest_hex)?;
        blob.refcount += 1;
        Some(BlobHandle { digest_hex: digest_hex.to_owned(), len: blob.len })
    }

    /// Insert a brand-new blob, taking ownership of `fd`. `digest_hex` must
    /// not already be present (callers are expected to `lookup` first). The
    /// blob's length is obtained by `fstat`ing `fd`, not taken on faith from
    /// the caller. Initial refcount is 1, reflected in the returned handle.
    pub fn insert(&mut self, digest_hex: String, fd: OwnedFd) -> Result<BlobHandle> {
        if self.blobs.contains_key(&digest_hex) {
            return Err(Error::DuplicateDigest(digest_hex));
        }
        let stat = nix::sys::stat::fstat(&fd).map_err(|errno| {
            Error::UnreadableFd(std::io::Error::from_raw_os_error(errno as i32))
        })?;
        let len = stat.st_size as u64;
        self.blobs.insert(digest_hex.clone(), Blob { fd, len, refcount: 1 });
        debug!(digest = %digest_hex, bytes = len, real_size = self.real_size(), "blob stored");
        Ok(BlobHandle { digest_hex, len })
    }

    /// Drop one reference to the blob named by `handle`. Destroys (and
    /// closes the fd of) the blob once its refcount reaches zero.
    ///
    /// A handle for a blob that is no longer present is tolerated silently:
    /// every call site holds exactly one live handle per reference it took,
    /// so this only happens if a caller double-releases, which indicates a
    /// bug upstream rather than something this method should panic over.
    pub fn release(&mut self, handle: &BlobHandle) {
        let Some(blob) = self.blobs.get_mut(&handle.digest_hex) else {
            return;
        };
        debug_assert!(blob.refcount > 0);
        blob.refcount = blob.refcount.saturating_sub(1);
        if blob.refcount == 0 {
            self.blobs.remove(&handle.digest_hex);
            // `fd` drops here, closing it exactly once.
            debug!(digest = %handle.digest_hex, real_size = self.real_size(), "blob destroyed");
        }
    }

    /// Number of live blobs, for diagnostics/tests.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// True when the store holds no blobs.
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Sum of `len` over every live blob (the invariant's `real_size`).
    pub fn real_size(&self) -> u64 {
        self.blobs.values().map(|b| b.len).sum()
    }

    /// Duplicate the fd backing `handle`, for attaching to a hit response
    /// (the store keeps its own fd open; the caller gets an independent
    /// descriptor onto the same sealed file).
    pub fn dup_fd(&self, handle: &BlobHandle) -> Result<OwnedFd> {
        let blob = self
            .blobs
            .get(&handle.digest_hex)
            .expect("handle outlives the blob it names");
        nix::unistd::dup(&blob.fd)
            .map_err(|errno| Error::DupFailed(std::io::Error::from_raw_os_error(errno as i32)))
    }

    /// Current refcount for a digest, for tests and invariant checks.
    #[cfg(test)]
    fn refcount_of(&self, digest_hex: &str) -> Option<u32> {
        self.blobs.get(digest_hex).map(|b| b.refcount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memfd(name: &str, size: u64) -> OwnedFd {
        let fd = nix::sys::memfd::memfd_create(
            &std::ffi::CString::new(name).unwrap(),
            nix::sys::memfd::MemFdCreateFlag::empty(),
        )
        .unwrap();
        nix::unistd::ftruncate(&fd, size as i64).unwrap();
        fd
    }

    #[test]
    fn insert_then_lookup_shares_one_blob() {
        let mut store = BlobStore::new();
        let h1 = store.insert("abc".into(), memfd("a", 3)).unwrap();
        assert_eq!(h1.len, 3);
        let h2 = store.lookup("abc").unwrap();
        assert_eq!(store.refcount_of("abc"), Some(2));
        assert_eq!(store.len(), 1);
        store.release(&h1);
        assert_eq!(store.refcount_of("abc"), Some(1));
        store.release(&h2);
        assert!(store.is_empty());
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut store = BlobStore::new();
        let _h = store.insert("x".into(), memfd("a", 0)).unwrap();
        let err = store.insert("x".into(), memfd("b", 0)).unwrap_err();
        assert!(matches!(err, Error::DuplicateDigest(_)));
    }

    #[test]
    fn real_size_sums_live_blobs() {
        let mut store = BlobStore::new();
        let h1 = store.insert("a".into(), memfd("a", 10)).unwrap();
        let _h2 = store.insert("b".into(), memfd("b", 20)).unwrap();
        assert_eq!(store.real_size(), 30);
        store.release(&h1);
        assert_eq!(store.real_size(), 20);
    }

    proptest::proptest! {
        #[test]
        fn refcount_matches_outstanding_handles(ops in proptest::collection::vec(0u8..3, 0..64)) {
            let mut store = BlobStore::new();
            let mut handles: Vec<BlobHandle> = Vec::new();
            let mut inserted = false;
            for op in ops {
                match op {
                    0 if !inserted => {
                        handles.push(store.insert("only".into(), memfd("a", 7)).unwrap());
                        inserted = true;
                    }
                    1 if inserted => {
                        if let Some(h) = store.lookup("only") {
                            handles.push(h);
                        }
                    }
                    2 if !handles.is_empty() => {
                        let h = handles.pop().unwrap();
                        store.release(&h);
                    }
                    _ => {}
                }
                if inserted && !handles.is_empty() {
                    assert_eq!(store.refcount_of("only"), Some(handles.len() as u32));
                }
            }
            for h in handles {
                store.release(&h);
            }
            assert!(store.is_empty());
        }
    }
}
