//! Internal failure type. Never leaves this crate: every public entry
//! point in [`crate::client`] degrades an `Err` here into a plain
//! heap-backed [`crate::Buffer`] instead of propagating it (spec §4.7/§7 —
//! "no dedup error is ever surfaced to the caller").

use thiserror::Error;

/// Something went wrong on the dedup path. Always recoverable by falling
/// back to a heap copy; kept around only so the fallback can be logged
/// before being swallowed.
#[derive(Debug, Error)]
pub(crate) enum Error {
    #[error("failed to create sealed memfd: {0}")]
    CreateMemfd(#[source] std::io::Error),
    #[error("failed to write submission into memfd: {0}")]
    WriteMemfd(#[source] std::io::Error),
    #[error("failed to seal memfd: {0}")]
    Seal(#[source] std::io::Error),
    #[error("failed to mmap fd: {0}")]
    Mmap(#[source] nix::errno::Errno),
    #[error("fixed remap did not land at the original address")]
    RemapMoved,
    #[error("MakeUnique call failed: {0}")]
    Ipc(#[from] zbus::Error),
    #[error("MakeUnique timed out")]
    Timeout,
}

pub(crate) type Result<T> = std::result::Result<T, Error>;
