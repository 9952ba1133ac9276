//! Errors surfaced by the blob store and peer table.
//!
//! These map 1:1 onto the daemon's two IPC error buckets (invalid-args vs.
//! internal); see `unique-daemon`'s dispatcher for that mapping.

use thiserror::Error;

/// Failure modes the core library can produce while servicing a request.
#[derive(Debug, Error)]
pub enum Error {
    /// The request carried no descriptor where one was required.
    #[error("no file descriptor attached")]
    MissingFd,
    /// The submitted descriptor is missing one or more of the four required seals.
    #[error("fd not sealed")]
    NotSealed,
    /// Reading the submitted descriptor's content failed.
    #[error("can't read data: {0}")]
    UnreadableFd(#[source] std::io::Error),
    /// The method's argument type signature did not match what was expected.
    #[error("bad argument signature")]
    BadSignature,
    /// A response fd list held an unexpected number of descriptors; this is
    /// an accounting bug in the daemon, not a client error.
    #[error("fd list accounting error: {0}")]
    FdListAccounting(String),
    /// Duplicating a blob's fd for a response failed.
    #[error("could not duplicate fd: {0}")]
    DupFailed(#[source] std::io::Error),
    /// Insert was asked to create a blob for a digest already present.
    #[error("digest {0} already present in store")]
    DuplicateDigest(String),
}

/// Convenience alias used throughout `unique-core`.
pub type Result<T> = std::result::Result<T, Error>;
