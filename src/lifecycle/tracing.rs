//! # Observability & Tracing
//!
//! [`setup_tracing`] installs the diagnostic sink for the whole node: a compact
//! `tracing_subscriber::fmt` layer filtered by an `EnvFilter`.
//!
//! ## Configuration
//!
//! The `[log]` section of the config sets the defaults:
//!
//! - `level`: filter directive used when `RUST_LOG` is not set
//! - `color`: ANSI-coloured level names
//! - `target`: show the emitting module path
//! - `dir`: also append plain-text logs to `<dir>/gram.log` (set on first run
//!   to `$GRAM_HOME/log`)
//!
//! `RUST_LOG` always wins over `level`:
//!
//! ```bash
//! RUST_LOG=debug gram
//! RUST_LOG=gram_node::network=debug,info gram
//! ```
//!
//! ## What Gets Traced
//!
//! - **Lifecycle**: phase transitions, module construction, teardown steps
//! - **Faults**: the fault that triggered shutdown, with its source module
//! - **Modules**: storage open/close, applied commands, connections
//!
//! Fields are structured (`module="storage"`, `error=...`) so they can be
//! filtered downstream.
//!
//! ## Output
//!
//! ```text
//! INFO Starting gram node
//! INFO Phase transition from=initializing to=running
//! INFO Termination signal received
//! INFO Releasing resource module="storage"
//! INFO Shutting down gram
//! ```

use crate::config::LogConfig;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name of the log inside [`LogConfig::dir`].
pub const LOG_FILE: &str = "gram.log";

/// Installs the global subscriber. Does nothing if one is already installed.
///
/// If the log file cannot be opened the node still logs to stdout, and the
/// failure is reported there.
pub fn setup_tracing(config: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file, file_error) = match config.dir.as_deref().map(open_log_file) {
        Some(Ok(file)) => (Some(file), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };
    let file_layer = file.map(|file| {
        fmt::layer()
            .compact()
            .with_ansi(false)
            .with_target(config.target)
            .with_writer(Mutex::new(file))
    });

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_ansi(config.color)
                .with_target(config.target),
        )
        .with(file_layer)
        .try_init()
        .is_ok();

    if let (true, Some(e)) = (installed, file_error) {
        warn!(error = %e, "Log file unavailable, logging to stdout only");
    }
}

fn open_log_file(dir: &Path) -> std::io::Result<File> {
    std::fs::create_dir_all(dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))
}
