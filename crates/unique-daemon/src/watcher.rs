//! Peer-death watcher (spec §4.4): the only mechanism that recovers state
//! from an unclean client exit, since there is no persistence to fall back
//! on and no heartbeat protocol of our own.

use crate::dispatcher;
use crate::service::SharedContext;
use futures_util::StreamExt;
use tracing::info;
use zbus::fdo::DBusProxy;

/// Subscribe to `NameOwnerChanged` on `conn` and drop the corresponding peer
/// (and every blob reference it held) whenever a unique connection name
/// disappears. Runs until the bus connection itself is dropped.
pub async fn run(conn: zbus::Connection, ctx: SharedContext) -> zbus::Result<()> {
    let dbus = DBusProxy::new(&conn).await?;
    let mut changes = dbus.receive_name_owner_changed().await?;
    while let Some(signal) = changes.next().await {
        let args = signal.args()?;
        let name = args.name().as_str();
        let old_owner_present = args.old_owner().as_ref().is_some();
        let new_owner_empty = args.new_owner().as_ref().is_none();

        if new_owner_empty && old_owner_present && name.starts_with(':') {
            info!(sender = %name, "peer disconnected, releasing its handles");
            let mut ctx = ctx.lock().expect("daemon state mutex poisoned");
            dispatcher::drop_peer(&mut ctx, name);
        }
    }
    Ok(())
}
