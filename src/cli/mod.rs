//! Operator subcommands.
//!
//! Each command opens the configured database, does one thing, and prints a
//! plain-text report to stdout. Logs go to stderr.

pub mod anticipations;
pub mod backfill;
pub mod context;
pub mod facts;
pub mod search;
pub mod stats;

use anyhow::{Context, Result};

use hearth::config::HearthConfig;
use hearth::db::Database;
use hearth::RequestContext;

/// Open the database named by the config.
pub fn open_database(config: &HearthConfig) -> Result<Database> {
    let db_path = config.resolved_db_path();
    Database::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))
}

/// A request context cancelled by Ctrl-C.
pub fn interruptible_context() -> RequestContext {
    let ctx = RequestContext::new();
    let cancel = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupted, cancelling...");
            cancel.cancel();
        }
    });
    ctx
}

/// Shorten `text` to at most `max` characters, marking the cut.
pub fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{cut}...")
}
