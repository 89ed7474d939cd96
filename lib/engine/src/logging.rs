//! Logger installation from [`LoggingConfig`].

use portal_nav_config::log::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber. Safe to call more than once;
/// later calls are no-ops.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(config.env_filter_str())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match config.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    if result.is_err() {
        tracing::debug!("logger already installed, keeping the existing one");
    }
}
