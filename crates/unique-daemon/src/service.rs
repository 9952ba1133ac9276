//! The `org.freedesktop.portal.Unique` object, wired to `zbus`.
//!
//! This is a thin adapter layer: argument (de)serialization and
//! error-code translation live here; all actual bookkeeping is in
//! `dispatcher`.

use crate::dispatcher;
use std::os::fd::OwnedFd as StdOwnedFd;
use std::sync::{Arc, Mutex};
use tracing::{field, info_span, warn};
use unique_core::DaemonContext;
use zbus::zvariant::OwnedFd;

/// Shared daemon state. `zbus`'s `Interface` trait (required by
/// `ObjectServer::at`) has a `Send + Sync` supertrait bound, so an
/// `Rc<RefCell<..>>` is rejected outright regardless of how single-threaded
/// the runtime actually is. `Arc<Mutex<..>>` satisfies the bound; the
/// `Mutex` is never contended in practice (one current-thread runtime, no
/// guard is ever held across an `.await`), so it costs nothing beyond the
/// type system formality.
pub type SharedContext = Arc<Mutex<DaemonContext>>;

/// The exported D-Bus object.
pub struct UniqueService {
    ctx: SharedContext,
}

impl UniqueService {
    /// Wrap `ctx` for export on the object server.
    pub fn new(ctx: SharedContext) -> Self {
        Self { ctx }
    }
}

#[zbus::interface(name = "org.freedesktop.portal.Unique")]
impl UniqueService {
    async fn make_unique(
        &self,
        memfd: OwnedFd,
        #[zbus(header)] header: zbus::message::Header<'_>,
    ) -> zbus::fdo::Result<(Vec<OwnedFd>, u32)> {
        let sender = header
            .sender()
            .ok_or_else(|| zbus::fdo::Error::Failed("request carried no sender".into()))?
            .to_string();
        let span = info_span!("MakeUnique", sender = field::display(&sender));
        let _enter = span.enter();

        let fd: StdOwnedFd = memfd.into();
        // The lock is scoped to this block, not held past it — there is no
        // `.await` anywhere in this method, but keep the habit anyway.
        let reply = {
            let mut ctx = self.ctx.lock().expect("daemon state mutex poisoned");
            dispatcher::make_unique(&mut ctx, &sender, fd).map_err(to_fdo_error)?
        };
        Ok((reply.fds.into_iter().map(OwnedFd::from).collect(), reply.handle))
    }

    async fn forget(
        &self,
        handle: u32,
        #[zbus(header)] header: zbus::message::Header<'_>,
    ) -> zbus::fdo::Result<()> {
        let sender = header
            .sender()
            .ok_or_else(|| zbus::fdo::Error::Failed("request carried no sender".into()))?
            .to_string();
        let span = info_span!("Forget", sender = field::display(&sender));
        let _enter = span.enter();

        let mut ctx = self.ctx.lock().expect("daemon state mutex poisoned");
        dispatcher::forget(&mut ctx, &sender, handle);
        Ok(())
    }
}

fn to_fdo_error(err: unique_core::Error) -> zbus::fdo::Error {
    use unique_core::Error::{BadSignature, DupFailed, DuplicateDigest, FdListAccounting, MissingFd, NotSealed, UnreadableFd};
    match err {
        MissingFd => zbus::fdo::Error::InvalidArgs("no file descriptor attached".into()),
        NotSealed => zbus::fdo::Error::InvalidArgs("Fd not sealed".into()),
        UnreadableFd(e) => zbus::fdo::Error::InvalidArgs(format!("Can't read data: {e}")),
        BadSignature => zbus::fdo::Error::InvalidArgs("bad argument signature".into()),
        FdListAccounting(msg) => {
            warn!(error = %msg, "internal fd accounting failure");
            zbus::fdo::Error::Failed(msg)
        }
        DuplicateDigest(_) | DupFailed(_) => {
            warn!(error = %err, "internal failure servicing MakeUnique");
            zbus::fdo::Error::Failed(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unique_core::Error;

    #[test]
    fn client_errors_map_to_invalid_args() {
        assert!(matches!(to_fdo_error(Error::MissingFd), zbus::fdo::Error::InvalidArgs(_)));
        assert!(matches!(to_fdo_error(Error::NotSealed), zbus::fdo::Error::InvalidArgs(_)));
        assert!(matches!(to_fdo_error(Error::BadSignature), zbus::fdo::Error::InvalidArgs(_)));
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert!(matches!(to_fdo_error(Error::UnreadableFd(io)), zbus::fdo::Error::InvalidArgs(_)));
    }

    #[test]
    fn internal_errors_map_to_failed() {
        assert!(matches!(
            to_fdo_error(Error::FdListAccounting("mismatch".into())),
            zbus::fdo::Error::Failed(_)
        ));
        assert!(matches!(
            to_fdo_error(Error::DuplicateDigest("abc".into())),
            zbus::fdo::Error::Failed(_)
        ));
        let io = std::io::Error::new(std::io::ErrorKind::Other, "dup failed");
        assert!(matches!(to_fdo_error(Error::DupFailed(io)), zbus::fdo::Error::Failed(_)));
    }
}
