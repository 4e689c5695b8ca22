//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter() -> &'static str {
    "info,polyarb=debug"
}

/// Whether `RUST_ENV` selects production (JSON) output.
pub fn is_production() -> bool {
    std::env::var("RUST_ENV")
        .map(|v| v == "production")
        .unwrap_or(false)
}

/// Initialize structured logging.
///
/// Configures tracing with JSON output for production and pretty output for
/// development. `extra` is stacked under the same filter; the bot passes the
/// dashboard log layer here so viewers see what the console sees.
pub fn init_logging<L>(extra: Option<L>) -> TelemetryResult<()>
where
    L: Layer<Registry> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter()));

    let result = if is_production() {
        // JSON format for production
        tracing_subscriber::registry()
            .with(extra)
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()
    } else {
        // Pretty format for development
        tracing_subscriber::registry()
            .with(extra)
            .with(env_filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_names(true),
            )
            .try_init()
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}
