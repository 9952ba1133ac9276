//! Structured logging bootstrap: no OpenTelemetry export (this service has
//! no metrics-export surface to feed and persistence is a non-goal), just
//! a `tracing-subscriber` `fmt` layer to stderr with the `F:`-prefixed
//! debug lines spec §6 asks for under `--verbose`.

#![warn(missing_docs)]

use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::{FmtContext, FormattedFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber for the daemon/client process.
///
/// `verbose` raises the filter to `debug` and switches on the `F:` prefix
/// spec §6 documents for debug lines; otherwise the filter stays at `info`
/// and lines are emitted unprefixed. `RUST_LOG` always overrides the
/// default level if set, via the standard `EnvFilter` precedence.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .event_format(DebugPrefixFormat { prefix_debug: verbose });
    let _ = tracing_subscriber::registry().with(filter).with(fmt_layer).try_init();
}

/// Wraps the default compact formatter, adding an `F:` prefix to debug and
/// trace events when `prefix_debug` is set.
struct DebugPrefixFormat {
    prefix_debug: bool,
}

impl<S, N> FormatEvent<S, N> for DebugPrefixFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let level = *event.metadata().level();
        if self.prefix_debug && level >= tracing::Level::DEBUG {
            write!(writer, "F:")?;
        }
        write!(writer, "{} {}: ", level, event.metadata().target())?;
        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{}{{{}}} ", span.name(), fields)?;
                    }
                }
            }
        }
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
