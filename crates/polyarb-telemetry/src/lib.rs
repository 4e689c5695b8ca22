//! Structured logging for polyarb.
//!
//! - Pretty output in development, JSON when `RUST_ENV=production`
//! - `RUST_LOG` filtering
//! - An optional extra layer (the dashboard log feed)

pub mod error;
pub mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{default_filter, init_logging, is_production};
