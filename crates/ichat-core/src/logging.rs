//! File logging.
//!
//! Logs go to `<ICHAT_HOME>/logs/ichat.log` so the terminal transcript stays
//! clean. `ICHAT_LOG` takes an `EnvFilter` directive string.

use std::fs;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::paths;

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "ICHAT_LOG";

pub const LOG_FILE: &str = "ichat.log";

/// Builds the filter: `ICHAT_LOG` if set, else `debug` when verbose, else `warn`.
pub fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "debug" } else { "warn" };
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Installs the global subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes buffered lines.
///
/// # Errors
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already set.
pub fn init(verbose: bool) -> Result<WorkerGuard> {
    let dir = paths::logs_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(&dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {e}"))?;

    Ok(guard)
}
