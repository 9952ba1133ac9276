//! Pure handler logic for `MakeUnique`/`Forget`, kept free of any D-Bus
//! types so it can be unit- and integration-tested by calling it directly
//! (spec §1 treats the transport itself as an external collaborator; these
//! functions are everything upstream of that).

use crate::hash::hash_fd;
use crate::seal::is_fully_sealed;
use std::os::fd::{AsFd, OwnedFd};
use tracing::{debug, instrument};
use unique_core::{DaemonContext, Error, Handle, Result};

/// Result of a successful `MakeUnique` call: the descriptor list to attach
/// to the reply (empty on miss, one fd on hit) and the peer's new handle.
pub struct MakeUniqueReply {
    /// fds to attach to the reply's `content` (`ah`) argument.
    pub fds: Vec<OwnedFd>,
    /// The handle minted for `sender`.
    pub handle: Handle,
}

/// Service `MakeUnique(memfd) -> (fds, handle)` against `ctx` on behalf of
/// `sender`, taking ownership of `fd` (spec §4.3).
#[instrument(skip(ctx, fd))]
pub fn make_unique(ctx: &mut DaemonContext, sender: &str, fd: OwnedFd) -> Result<MakeUniqueReply> {
    if !is_fully_sealed(fd.as_fd()) {
        return Err(Error::NotSealed);
    }
    let digest = hash_fd(fd.as_fd()).map_err(Error::UnreadableFd)?;
    let digest_hex = digest.to_hex();

    let (fds, blob) = match ctx.blobs.lookup(&digest_hex) {
        Some(existing) => {
            let dup = ctx.blobs.dup_fd(&existing)?;
            debug!(digest = %digest_hex, "MakeUnique hit");
            // `fd` (the caller's own submission) is dropped here, closing it:
            // the client already holds an equivalent mapping of its own.
            (vec![dup], existing)
        }
        None => {
            let len_before = ctx.blobs.real_size();
            let inserted = ctx.blobs.insert(digest_hex.clone(), fd)?;
            debug!(
                digest = %digest_hex,
                bytes = inserted.len,
                real_size = len_before + inserted.len,
                "MakeUnique miss, new blob"
            );
            (Vec::new(), inserted)
        }
    };

    let handle = ctx.peers.add(sender, blob);
    Ok(MakeUniqueReply { fds, handle })
}

/// Service `Forget(handle) -> ()` against `ctx` on behalf of `sender`.
/// Unknown handles succeed silently (spec §4.3/§8).
#[instrument(skip(ctx))]
pub fn forget(ctx: &mut DaemonContext, sender: &str, handle: Handle) {
    ctx.peers.remove(&mut ctx.blobs, sender, handle);
}

/// Release every reference `sender` held, e.g. on `NameOwnerChanged`
/// teardown or clean daemon shutdown (spec §4.4).
pub fn drop_peer(ctx: &mut DaemonContext, sender: &str) {
    ctx.peers.drop_peer(&mut ctx.blobs, sender);
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::memfd::{memfd_create, MemFdCreateFlag};
    use nix::unistd::write;
    use std::ffi::CString;

    fn sealed_memfd(bytes: &[u8]) -> OwnedFd {
        let fd = memfd_create(
            &CString::new("t").unwrap(),
            MemFdCreateFlag::MFD_ALLOW_SEALING,
        )
        .unwrap();
        let mut written = 0;
        while written < bytes.len() {
            written += write(&fd, &bytes[written..]).unwrap();
        }
        use nix::fcntl::{fcntl, FcntlArg, SealFlag};
        let all = SealFlag::F_SEAL_SEAL
            | SealFlag::F_SEAL_SHRINK
            | SealFlag::F_SEAL_GROW
            | SealFlag::F_SEAL_WRITE;
        fcntl(&fd, FcntlArg::F_ADD_SEALS(all)).unwrap();
        fd
    }

    fn unsealed_memfd(bytes: &[u8]) -> OwnedFd {
        let fd = memfd_create(&CString::new("t").unwrap(), MemFdCreateFlag::empty()).unwrap();
        let mut written = 0;
        while written < bytes.len() {
            written += write(&fd, &bytes[written..]).unwrap();
        }
        fd
    }

    #[test]
    fn scenario_1_fresh_daemon_first_submission() {
        let mut ctx = DaemonContext::new();
        let reply = make_unique(&mut ctx, ":1.1", sealed_memfd(b"Hello, World!\0")).unwrap();
        assert!(reply.fds.is_empty());
        assert_eq!(reply.handle, 1);
        assert_eq!(ctx.real_size(), 14);
        assert_eq!(ctx.apparent_size(), 14);
    }

    #[test]
    fn scenario_2_second_peer_same_content_is_a_hit() {
        let mut ctx = DaemonContext::new();
        make_unique(&mut ctx, ":1.1", sealed_memfd(b"Hello, World!\0")).unwrap();
        let reply = make_unique(&mut ctx, ":1.2", sealed_memfd(b"Hello, World!\0")).unwrap();
        assert_eq!(reply.fds.len(), 1);
        assert_eq!(reply.handle, 1);
        assert_eq!(ctx.real_size(), 14);
        assert_eq!(ctx.apparent_size(), 28);
    }

    #[test]
    fn scenario_3_forget_releases_one_reference() {
        let mut ctx = DaemonContext::new();
        make_unique(&mut ctx, ":1.1", sealed_memfd(b"Hello, World!\0")).unwrap();
        make_unique(&mut ctx, ":1.2", sealed_memfd(b"Hello, World!\0")).unwrap();
        forget(&mut ctx, ":1.1", 1);
        assert_eq!(ctx.real_size(), 14);
        assert_eq!(ctx.apparent_size(), 14);
    }

    #[test]
    fn scenario_4_peer_death_destroys_last_reference() {
        let mut ctx = DaemonContext::new();
        make_unique(&mut ctx, ":1.1", sealed_memfd(b"Hello, World!\0")).unwrap();
        make_unique(&mut ctx, ":1.2", sealed_memfd(b"Hello, World!\0")).unwrap();
        forget(&mut ctx, ":1.1", 1);
        drop_peer(&mut ctx, ":1.2");
        assert_eq!(ctx.real_size(), 0);
        assert_eq!(ctx.apparent_size(), 0);
    }

    #[test]
    fn scenario_5_unsealed_fd_is_rejected() {
        let mut ctx = DaemonContext::new();
        let err = make_unique(&mut ctx, ":1.1", unsealed_memfd(b"x")).unwrap_err();
        assert!(matches!(err, Error::NotSealed));
        assert_eq!(ctx.real_size(), 0);
    }

    #[test]
    fn zero_length_submission_succeeds() {
        let mut ctx = DaemonContext::new();
        let reply = make_unique(&mut ctx, ":1.1", sealed_memfd(b"")).unwrap();
        assert!(reply.fds.is_empty());
        assert_eq!(ctx.real_size(), 0);
        assert_eq!(ctx.apparent_size(), 0);
    }

    #[test]
    fn duplicate_forget_is_silent_success() {
        let mut ctx = DaemonContext::new();
        let reply = make_unique(&mut ctx, ":1.1", sealed_memfd(b"x")).unwrap();
        forget(&mut ctx, ":1.1", reply.handle);
        forget(&mut ctx, ":1.1", reply.handle);
    }
}
