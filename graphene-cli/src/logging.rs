//! Console and file logging for the CLI
//!
//! Records from the core's `TracingSink` carry their destination in the
//! target: `graphene::console` stays off the log file and `graphene::file`
//! stays off the console. Everything else goes to both.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::Metadata;
use tracing_subscriber::filter::{EnvFilter, FilterExt, filter_fn};
use tracing_subscriber::prelude::*;

const CONSOLE_ONLY: &str = "graphene::console";
const FILE_ONLY: &str = "graphene::file";

/// Path the previous run's log is moved to: `graphene.log` → `graphene.old.log`
pub fn old_log_path(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => path.with_extension(format!("old.{ext}")),
        None => path.with_extension("old"),
    }
}

/// Move an existing log aside, replacing any older one, and open a fresh file
pub fn rotate(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    if path.exists() {
        let old = old_log_path(path);
        if old.exists() {
            fs::remove_file(&old)?;
        }
        fs::rename(path, &old)?;
    }

    File::create(path)
}

/// Install the global subscriber
pub fn init(log_file: &Path, verbose: bool) -> io::Result<()> {
    let file = rotate(log_file)?;
    let level = if verbose { "debug" } else { "info" };

    let console = tracing_subscriber::fmt::layer()
        .with_target(verbose)
        .with_filter(EnvFilter::new(level).and(filter_fn(|meta| not_target(meta, FILE_ONLY))));

    let file = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(file))
        .with_filter(EnvFilter::new("debug").and(filter_fn(|meta| not_target(meta, CONSOLE_ONLY))));

    tracing_subscriber::registry().with(console).with(file).init();
    Ok(())
}

fn not_target(meta: &Metadata<'_>, target: &str) -> bool {
    meta.target() != target
}
