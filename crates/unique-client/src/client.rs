//! Submit paths (spec §4.5 sync, §4.6 async). Both degrade any failure to
//! a plain heap copy — callers never see a dedup error (spec §4.7).

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::{mapping, memfile};
use std::os::fd::{AsFd, OwnedFd};
use std::time::Duration;
use tracing::debug;
use unique_ipc::UniqueProxy;

/// Default timeout for the synchronous submit path (spec §5 recommends
/// 3000ms).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Submit `bytes` for deduplication and block until the daemon replies or
/// `timeout` elapses. Always returns a usable buffer: any failure anywhere
/// on the dedup path falls back to a private heap copy of `bytes`.
pub async fn submit(conn: &zbus::Connection, bytes: &[u8], timeout: Duration) -> Buffer {
    match try_submit(conn, bytes, timeout).await {
        Ok(buffer) => buffer,
        Err(e) => {
            debug!(error = %e, "dedup submit failed, falling back to heap copy");
            Buffer::from_heap(bytes.to_vec())
        }
    }
}

async fn try_submit(conn: &zbus::Connection, bytes: &[u8], timeout: Duration) -> Result<Buffer> {
    let fd = memfile::create_sealed(bytes)?;
    let proxy = UniqueProxy::new(conn).await?;

    let reply = tokio::time::timeout(timeout, call_make_unique(&proxy, fd.as_fd()))
        .await
        .map_err(|_| Error::Timeout)??;

    let mapped = match reply.fds.into_iter().next() {
        Some(canonical) => mapping::map_readonly_private(canonical.as_fd(), bytes.len())?,
        None => mapping::map_readonly_private(fd.as_fd(), bytes.len())?,
    };
    // The memfd is no longer needed once mapped — the mapping keeps the
    // underlying file alive (spec §4.5 step 6).
    drop(fd);

    Ok(Buffer::from_mapped(mapped, reply.handle, Some(proxy)))
}

/// Submit `bytes` without blocking on the bus round trip: map the sealed
/// fd immediately and return a buffer over it, then reconcile with the
/// daemon's reply in the background (spec §4.6).
pub async fn submit_async(conn: zbus::Connection, bytes: Vec<u8>) -> Buffer {
    match try_submit_async(conn, bytes).await {
        Ok(buffer) => buffer,
        Err((e, bytes)) => {
            debug!(error = %e, "async dedup submit failed, falling back to heap copy");
            Buffer::from_heap(bytes)
        }
    }
}

async fn try_submit_async(conn: zbus::Connection, bytes: Vec<u8>) -> std::result::Result<Buffer, (Error, Vec<u8>)> {
    let fd = match memfile::create_sealed(&bytes) {
        Ok(fd) => fd,
        Err(e) => return Err((e, bytes)),
    };
    let mapped = match mapping::map_readonly_private(fd.as_fd(), bytes.len()) {
        Ok(m) => m,
        Err(e) => return Err((e, bytes)),
    };

    let proxy = match UniqueProxy::new(&conn).await {
        Ok(p) => p,
        Err(e) => {
            debug!(error = %e, "no bus connection; keeping local mapping undeduplicated");
            return Ok(Buffer::from_mapped(mapped, 0, None));
        }
    };

    let buffer = Buffer::from_mapped(mapped, 0, Some(proxy.clone()));
    let reply_buffer = buffer.clone();
    tokio::task::spawn_local(async move {
        reconcile_async_reply(proxy, fd, reply_buffer).await;
    });
    Ok(buffer)
}

/// Runs after the mapping has already been handed to the caller. Tolerates
/// the buffer having been dropped in the interim (spec §5: an in-flight
/// async call must not panic if its record is gone before the reply lands).
async fn reconcile_async_reply(proxy: UniqueProxy<'static>, fd: OwnedFd, buffer: Buffer) {
    let reply = match call_make_unique(&proxy, fd.as_fd()).await {
        Ok(reply) => reply,
        Err(e) => {
            debug!(error = %e, "async MakeUnique failed; mapping stays heap-equivalent");
            return;
        }
    };
    drop(fd);

    if let Some(canonical) = reply.fds.into_iter().next() {
        if let Some(mapped) = buffer.mapped() {
            if let Err(e) = mapping::remap_fixed(mapped, canonical.as_fd()) {
                // spec §4.6: the fixed remap must land at the original
                // address or the process is in an unrecoverable state —
                // callers already hold pointers into that range.
                panic!("fixed-address remap failed, aborting: {e}");
            }
        }
    }
    buffer.set_handle(reply.handle);
}

struct MakeUniqueReply {
    fds: Vec<OwnedFd>,
    handle: u32,
}

async fn call_make_unique(proxy: &UniqueProxy<'static>, fd: std::os::fd::BorrowedFd<'_>) -> zbus::Result<MakeUniqueReply> {
    let memfd = zbus::zvariant::Fd::from(fd);
    let (fds, handle) = proxy.make_unique(memfd).await?;
    Ok(MakeUniqueReply {
        fds: fds.into_iter().map(OwnedFd::from).collect(),
        handle,
    })
}
