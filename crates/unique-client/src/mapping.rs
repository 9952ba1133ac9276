//! Read-only private mappings over a sealed fd, plus the fixed-address
//! remap used by the asynchronous submit path (spec §4.6).

use crate::error::{Error, Result};
use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};
use std::num::NonZeroUsize;
use std::os::fd::BorrowedFd;
use std::ptr::NonNull;

/// A private read-only view of `len` bytes. `ptr` is `None` for a
/// zero-length mapping — `mmap(2)` rejects a zero length outright, and an
/// empty buffer needs no backing pages anyway.
pub(crate) struct Mapped {
    ptr: Option<NonNull<u8>>,
    len: usize,
}

impl Mapped {
    /// # Safety
    /// The caller must ensure the mapping (if any) outlives every use of
    /// the returned slice.
    pub(crate) unsafe fn as_slice(&self) -> &[u8] {
        match self.ptr {
            Some(p) => std::slice::from_raw_parts(p.as_ptr(), self.len),
            None => &[],
        }
    }

    pub(crate) fn addr(&self) -> Option<NonNull<u8>> {
        self.ptr
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

/// Map `fd` read-only and private for `len` bytes (spec §4.5 step 4/5).
pub(crate) fn map_readonly_private(fd: BorrowedFd<'_>, len: usize) -> Result<Mapped> {
    if len == 0 {
        return Ok(Mapped { ptr: None, len: 0 });
    }
    let len = NonZeroUsize::new(len).expect("checked non-zero above");
    // SAFETY: `fd` is a live, sealed, readable descriptor for the
    // duration of this call; the mapping is private and read-only so no
    // write-back or cross-process aliasing can occur.
    let ptr = unsafe { mmap(None, len, ProtFlags::PROT_READ, MapFlags::MAP_PRIVATE, fd, 0) }
        .map_err(Error::Mmap)?;
    Ok(Mapped {
        ptr: Some(ptr.cast()),
        len: len.get(),
    })
}

/// Replace an existing mapping at `old.addr()` with a fresh private
/// read-only mapping of `fd`, landing at the exact same virtual address
/// (spec §4.6). `mmap(2)` with `MAP_FIXED` only ever returns the requested
/// address or fails outright — it never silently relocates — but we check
/// anyway and treat any mismatch as the abort condition spec §4.6 demands.
pub(crate) fn remap_fixed(old: &Mapped, fd: BorrowedFd<'_>) -> Result<Mapped> {
    let Some(addr) = old.addr() else {
        // A zero-length mapping has nothing to remap at; the reply's new
        // fd is simply discarded and the caller keeps its empty buffer.
        return Ok(Mapped { ptr: None, len: 0 });
    };
    let len = NonZeroUsize::new(old.len()).expect("non-null addr implies non-zero len");
    // SAFETY: `addr` came from a mapping we own and are replacing; no
    // other mapping may occupy this range in the interim on a
    // single-threaded event loop.
    let fixed_addr = NonZeroUsize::new(addr.as_ptr() as usize).expect("mapped address is non-null");
    let new_ptr = unsafe {
        mmap(
            Some(fixed_addr),
            len,
            ProtFlags::PROT_READ,
            MapFlags::MAP_PRIVATE | MapFlags::MAP_FIXED,
            fd,
            0,
        )
    }
    .map_err(Error::Mmap)?;

    if new_ptr.as_ptr() != addr.as_ptr().cast() {
        return Err(Error::RemapMoved);
    }
    Ok(Mapped {
        ptr: Some(new_ptr.cast()),
        len: len.get(),
    })
}

/// Drop a mapping's backing pages. No-op for a zero-length mapping.
pub(crate) unsafe fn unmap(mapped: Mapped) {
    if let Some(ptr) = mapped.ptr {
        let len = NonZeroUsize::new(mapped.len).expect("non-null ptr implies non-zero len");
        let _ = munmap(ptr.cast(), len.get());
    }
}
