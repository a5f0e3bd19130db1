//! Logging setup for the CLI

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Variable holding the log filter, e.g. `buildgrid_core=debug`
pub const LOG_ENV: &str = "BUILDGRID_LOG";

/// `BUILDGRID_LOG`, then `RUST_LOG`, then `info`.
fn log_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Logs go to stderr so simulation summaries
/// on stdout stay clean.
///
/// # Errors
/// Returns an error if a global subscriber is already installed
pub fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}
