//! Logging for quill
//!
//! Installs a `tracing-subscriber` registry driven by [`LogConfig`]. The core
//! crates only emit `tracing` events; hosts decide whether and how to
//! collect them by calling [`init`] once at startup.

use quill_config::{LogConfig, LogFormat};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber
///
/// An invalid filter directive falls back to `info` rather than failing.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been installed
pub fn init(config: &LogConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;
    tracing::debug!(filter = %config.filter, format = ?config.format, "logging initialised");

    Ok(())
}
