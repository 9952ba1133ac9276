//! Verifying a submitted fd carries all four required memfd seals.

use nix::fcntl::{fcntl, FcntlArg, SealFlag};
use std::os::fd::BorrowedFd;

/// The seal set every submitted fd must carry (spec §6): sealing itself
/// from further sealing, and forbidding shrink/grow/write.
const REQUIRED: SealFlag = SealFlag::from_bits_truncate(
    SealFlag::F_SEAL_SEAL.bits()
        | SealFlag::F_SEAL_SHRINK.bits()
        | SealFlag::F_SEAL_GROW.bits()
        | SealFlag::F_SEAL_WRITE.bits(),
);

/// True if `fd` carries every seal in `REQUIRED`. A non-memfd (or a memfd
/// created without `MFD_ALLOW_SEALING`) fails `F_GET_SEALS` outright, which
/// we also treat as "not sealed" rather than propagating the errno.
pub fn is_fully_sealed(fd: BorrowedFd<'_>) -> bool {
    match fcntl(fd, FcntlArg::F_GET_SEALS) {
        Ok(bits) => SealFlag::from_bits_truncate(bits).contains(REQUIRED),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::memfd::{memfd_create, MemFdCreateFlag};
    use std::ffi::CString;
    use std::os::fd::AsFd;

    #[test]
    fn unsealed_memfd_fails() {
        let fd = memfd_create(&CString::new("t").unwrap(), MemFdCreateFlag::MFD_ALLOW_SEALING)
            .unwrap();
        assert!(!is_fully_sealed(fd.as_fd()));
    }

    #[test]
    fn fully_sealed_memfd_passes() {
        let fd = memfd_create(&CString::new("t").unwrap(), MemFdCreateFlag::MFD_ALLOW_SEALING)
            .unwrap();
        fcntl(fd.as_fd(), FcntlArg::F_ADD_SEALS(REQUIRED)).unwrap();
        assert!(is_fully_sealed(fd.as_fd()));
    }

    #[test]
    fn partially_sealed_memfd_fails() {
        let fd = memfd_create(&CString::new("t").unwrap(), MemFdCreateFlag::MFD_ALLOW_SEALING)
            .unwrap();
        fcntl(fd.as_fd(), FcntlArg::F_ADD_SEALS(SealFlag::F_SEAL_WRITE)).unwrap();
        assert!(!is_fully_sealed(fd.as_fd()));
    }
}
