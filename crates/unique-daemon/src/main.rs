//! `unique-daemon`: the long-lived process owning the blob store and peer
//! table. Single-threaded cooperative event loop per spec §5 — one `tokio`
//! current-thread runtime. State lives behind `Arc<Mutex<_>>` (see
//! `service::SharedContext`) because `zbus`'s `Interface` trait requires
//! `Send + Sync`, not because anything actually touches it from another
//! thread.

use clap::Parser;
use enumflags2::BitFlags;
use std::sync::{Arc, Mutex};
use tracing::{error, info};
use unique_daemon::cli::Args;
use unique_daemon::service::{SharedContext, UniqueService};
use unique_daemon::watcher;
use zbus::fdo::{DBusProxy, RequestNameFlags, RequestNameReply};

fn main() -> std::process::ExitCode {
    let args = Args::parse();
    unique_telemetry::init_logging(args.verbose);

    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start runtime");
            return std::process::ExitCode::FAILURE;
        }
    };
    let outcome = rt.block_on(run(args));
    match outcome {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal error");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> zbus::Result<()> {
    let ctx: SharedContext = Arc::new(Mutex::new(unique_core::DaemonContext::new()));

    let conn = zbus::conn::Builder::session()?.build().await?;
    conn.object_server().at(unique_ipc::OBJECT_PATH, UniqueService::new(ctx.clone())).await?;

    let dbus = DBusProxy::new(&conn).await?;
    let mut flags: BitFlags<RequestNameFlags> = RequestNameFlags::AllowReplacement.into();
    if args.replace {
        flags |= RequestNameFlags::ReplaceExisting;
    }
    let reply = dbus.request_name(unique_ipc::BUS_NAME.try_into()?, flags).await?;
    if !matches!(reply, RequestNameReply::PrimaryOwner) {
        error!(?reply, "could not obtain bus name");
        return Err(zbus::Error::Failure("name not obtained".into()));
    }
    info!(name = unique_ipc::BUS_NAME, "owns bus name, serving requests");

    tokio::task::spawn(watcher::run(conn.clone(), ctx.clone()));
    tokio::task::spawn(watch_for_name_loss(dbus.clone()));

    tokio::signal::ctrl_c().await.map_err(|e| zbus::Error::Failure(e.to_string()))?;
    info!("received shutdown signal, exiting cleanly");
    Ok(())
}

/// Exit non-zero if the bus ever tells us we've lost the name we own —
/// e.g. another instance started with `--replace` (spec §6/§7).
async fn watch_for_name_loss(dbus: DBusProxy<'static>) {
    let Ok(mut lost) = dbus.receive_name_lost().await else { return };
    use futures_util::StreamExt;
    while let Some(signal) = lost.next().await {
        if let Ok(args) = signal.args() {
            if args.name.as_str() == unique_ipc::BUS_NAME {
                error!(name = unique_ipc::BUS_NAME, "lost bus name, exiting");
                std::process::exit(1);
            }
        }
    }
}
