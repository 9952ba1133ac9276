//! Command-line flags (spec §6). Only two exist; anything else is a parse
//! error that exits 1 before a bus connection is ever attempted.

use clap::Parser;

/// `org.freedesktop.portal.Unique` session dedup daemon.
#[derive(Parser, Debug)]
#[command(name = "unique-daemon")]
pub struct Args {
    /// Replace any existing owner of the well-known bus name.
    #[arg(long)]
    pub replace: bool,

    /// Emit debug-level logging to stderr, prefixed with `F:`.
    #[arg(long)]
    pub verbose: bool,
}
