// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::{CompError, Result};

/// Name of the run log inside the output directory.
pub const LOG_FILE: &str = "log";

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping it flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Filter directive used when `RUST_LOG` is not set.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Create `outdir` if needed and truncate the log file in it.
pub fn prepare_log_file(outdir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(outdir)?;
    let path = outdir.join(LOG_FILE);
    fs::write(&path, "")?;
    Ok(path)
}

/// Install the global subscriber: a console layer on stderr and a plain
/// file layer writing `<outdir>/log`.
///
/// # Errors
/// Returns an I/O error if the log file cannot be prepared, or a
/// configuration error if a global subscriber is already installed.
pub fn init_logging(outdir: &Path, verbose: bool) -> Result<LoggingGuard> {
    prepare_log_file(outdir)?;

    let file_appender = tracing_appender::rolling::never(outdir, LOG_FILE);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(false);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .without_time();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| CompError::Configuration(format!("could not install logger: {}", e)))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
