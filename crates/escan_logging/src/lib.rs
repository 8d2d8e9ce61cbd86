//! Logging setup shared by eScan binaries.
//!
//! Installs a `tracing` subscriber with two layers: a size-rotated file under the
//! configured log directory and a stderr layer whose verbosity follows `--verbose`.
//! `RUST_LOG` overrides the default filter for both.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod rolling;

use rolling::{RollingFile, SharedRollingFile};

const DEFAULT_LOG_FILTER: &str = "escan=info,escan_core=info,escan_db=warn";
const QUIET_CONSOLE_FILTER: &str = "warn";
const MAX_LOG_FILES: usize = 5;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Logging configuration for one process.
pub struct LogConfig {
    pub app_name: String,
    pub log_dir: PathBuf,
    /// Mirror the file filter on stderr instead of warnings only.
    pub verbose: bool,
}

/// Initialize tracing for the process. Call once, early in `main`.
///
/// Returns the path of the live log file.
pub fn init_logging(config: LogConfig) -> Result<PathBuf> {
    let rolling = RollingFile::open(
        config.log_dir.clone(),
        &config.app_name,
        MAX_LOG_FILES,
        MAX_LOG_FILE_SIZE,
    )
    .with_context(|| format!("Failed to open log file in {}", config.log_dir.display()))?;
    let log_path = rolling.current_path();

    let file_filter = default_filter();
    let console_filter = if config.verbose {
        default_filter()
    } else {
        EnvFilter::new(QUIET_CONSOLE_FILTER)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(SharedRollingFile::new(rolling))
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(log_path)
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}
