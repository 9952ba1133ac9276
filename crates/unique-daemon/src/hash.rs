//! Streaming content hash of a submitted fd, read positionally so the fd's
//! own offset (which the caller may still care about) is never disturbed.

use nix::sys::uio::pread;
use std::os::fd::BorrowedFd;
use unique_core::{Digest, DigestHasher};

const CHUNK_SIZE: usize = 64 * 1024;

/// Read `fd` from offset 0 to EOF in `CHUNK_SIZE` chunks via `pread`,
/// feeding every chunk into a running SHA-256. Spec §4.3 step 3.
pub fn hash_fd(fd: BorrowedFd<'_>) -> std::io::Result<Digest> {
    let mut hasher = DigestHasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut offset: i64 = 0;
    loop {
        let n = pread(fd, &mut buf, offset)
            .map_err(|errno| std::io::Error::from_raw_os_error(errno as i32))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        offset += n as i64;
    }
    Ok(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::memfd::{memfd_create, MemFdCreateFlag};
    use nix::unistd::write;
    use std::ffi::CString;
    use std::os::fd::AsFd;

    fn memfd_with(bytes: &[u8]) -> std::os::fd::OwnedFd {
        let fd = memfd_create(&CString::new("t").unwrap(), MemFdCreateFlag::empty()).unwrap();
        let mut written = 0;
        while written < bytes.len() {
            written += write(&fd, &bytes[written..]).unwrap();
        }
        fd
    }

    #[test]
    fn hashes_multi_chunk_content() {
        let data = vec![0xAB_u8; CHUNK_SIZE * 2 + 17];
        let fd = memfd_with(&data);
        let digest = hash_fd(fd.as_fd()).unwrap();
        assert_eq!(digest, Digest::of(&data));
    }

    #[test]
    fn empty_fd_hashes_to_empty_digest() {
        let fd = memfd_with(&[]);
        let digest = hash_fd(fd.as_fd()).unwrap();
        assert_eq!(digest, Digest::of(b""));
    }
}
