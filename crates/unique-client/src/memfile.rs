//! Building the sealed anonymous file a submission travels in (spec §4.5
//! step 1-2).

use crate::error::{Error, Result};
use nix::fcntl::{fcntl, FcntlArg, SealFlag};
use nix::sys::memfd::{memfd_create, MemFdCreateFlag};
use nix::unistd::ftruncate;
use std::ffi::CString;
use std::io::Write;
use std::os::fd::{AsFd, OwnedFd};
use std::sync::atomic::{AtomicU64, Ordering};

static COUNTER: AtomicU64 = AtomicU64::new(0);

const SEALS: SealFlag = SealFlag::from_bits_truncate(
    SealFlag::F_SEAL_SEAL.bits()
        | SealFlag::F_SEAL_SHRINK.bits()
        | SealFlag::F_SEAL_GROW.bits()
        | SealFlag::F_SEAL_WRITE.bits(),
);

/// Create, fill, and fully seal an anonymous file holding `bytes`. Each
/// call gets a distinct name (`unique-<pid>-<counter>`) purely for
/// debuggability — memfds have no path, so nothing else depends on it.
pub(crate) fn create_sealed(bytes: &[u8]) -> Result<OwnedFd> {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = CString::new(format!("unique-{}-{n}", std::process::id())).expect("no NUL in name");
    let fd = memfd_create(&name, MemFdCreateFlag::MFD_CLOEXEC | MemFdCreateFlag::MFD_ALLOW_SEALING)
        .map_err(|e| Error::CreateMemfd(e.into()))?;

    ftruncate(&fd, bytes.len() as i64).map_err(|e| Error::WriteMemfd(e.into()))?;
    write_all_retrying(&fd, bytes)?;
    fcntl(fd.as_fd(), FcntlArg::F_ADD_SEALS(SEALS)).map_err(|e| Error::Seal(e.into()))?;

    Ok(fd)
}

fn write_all_retrying(fd: &OwnedFd, bytes: &[u8]) -> Result<()> {
    use std::os::fd::AsRawFd;
    // `std::fs::File` gives us a retrying `write_all` over the raw fd
    // without taking ownership of it (it's dropped without closing via
    // `ManuallyDrop` once we're done).
    let raw = fd.as_raw_fd();
    let mut file = std::mem::ManuallyDrop::new(unsafe { std::fs::File::from_raw_fd(raw) });
    file.write_all(bytes).map_err(Error::WriteMemfd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping;

    #[test]
    fn round_trips_content() {
        let fd = create_sealed(b"hello world").unwrap();
        let mapped = mapping::map_readonly_private(fd.as_fd(), 11).unwrap();
        assert_eq!(unsafe { mapped.as_slice() }, b"hello world");
        unsafe { mapping::unmap(mapped) };
    }

    #[test]
    fn empty_submission_is_sealed() {
        let fd = create_sealed(b"").unwrap();
        let bits = fcntl(fd.as_fd(), FcntlArg::F_GET_SEALS).unwrap();
        assert!(SealFlag::from_bits_truncate(bits).contains(SEALS));
    }
}
