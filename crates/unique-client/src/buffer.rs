//! The caller-facing handle returned by [`crate::submit`]/[`crate::submit_async`].
//!
//! Mirrors the refcounted-record shape spec §4.5 step 7 describes: an `Rc`
//! plays the role of the shared smart-handle spec §9's design notes call
//! for, and `Inner`'s `Drop` is the single place that unmaps and fires the
//! `Forget` — there is exactly one owner of that cleanup regardless of how
//! many `Buffer` clones existed.

use crate::mapping::{unmap, Mapped};
use std::cell::Cell;
use std::ops::Deref;
use std::rc::Rc;
use tracing::debug;
use unique_ipc::UniqueProxy;

enum Data {
    Mapped(Mapped),
    Heap(Vec<u8>),
}

struct Inner {
    data: Data,
    /// 0 means "no handle to forget" — either the daemon is unreachable
    /// (heap fallback) or a reply simply hasn't arrived yet for the async
    /// path. Set exactly once.
    handle: Cell<u32>,
    proxy: Option<UniqueProxy<'static>>,
}

impl Inner {
    fn set_handle(&self, handle: u32) {
        self.handle.set(handle);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Data::Mapped(mapped) = std::mem::replace(&mut self.data, Data::Heap(Vec::new())) {
            // SAFETY: this is the only owner of the mapping; no other
            // `Buffer` clone can still be dereferencing it once we're here.
            unsafe { unmap(mapped) };
        }

        let handle = self.handle.get();
        if handle == 0 {
            return;
        }
        let Some(proxy) = self.proxy.clone() else { return };
        // Fire-and-forget: spec §4.5 step 7 requires no reply be awaited.
        // `spawn_local` requires an active `LocalSet`, matching the
        // single-threaded event-loop model spec §5 mandates for the client.
        tokio::task::spawn_local(async move {
            if let Err(e) = proxy.forget(handle).await {
                debug!(error = %e, handle, "Forget failed; daemon will reclaim on peer death");
            }
        });
    }
}

/// A deduplicated (or, on any failure, plain heap) byte buffer. Cheaply
/// cloneable; the backing memory is released when the last clone drops.
#[derive(Clone)]
pub struct Buffer(Rc<Inner>);

impl Buffer {
    pub(crate) fn from_mapped(mapped: Mapped, handle: u32, proxy: Option<UniqueProxy<'static>>) -> Self {
        Self(Rc::new(Inner {
            data: Data::Mapped(mapped),
            handle: Cell::new(handle),
            proxy,
        }))
    }

    pub(crate) fn from_heap(bytes: Vec<u8>) -> Self {
        Self(Rc::new(Inner {
            data: Data::Heap(bytes),
            handle: Cell::new(0),
            proxy: None,
        }))
    }

    /// Record a handle that arrived after construction (the async remap
    /// path records it once the reply lands, spec §4.6).
    pub(crate) fn set_handle(&self, handle: u32) {
        self.0.set_handle(handle);
    }

    /// True if this buffer is backed by a kernel mapping rather than a
    /// private heap copy. Exposed mainly for tests.
    pub fn is_deduplicated(&self) -> bool {
        matches!(self.0.data, Data::Mapped(_))
    }

    /// Borrow the underlying mapping, if any — used by the async remap
    /// path to reach the original mapping's address/length without taking
    /// ownership away from this `Buffer`.
    pub(crate) fn mapped(&self) -> Option<&Mapped> {
        match &self.0.data {
            Data::Mapped(m) => Some(m),
            Data::Heap(_) => None,
        }
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match &self.0.data {
            // SAFETY: the mapping lives at least as long as `self.0`, and
            // `Buffer` can only be dereferenced while some `Rc` to it exists.
            Data::Mapped(m) => unsafe { m.as_slice() },
            Data::Heap(v) => v.as_slice(),
        }
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        self
    }
}
