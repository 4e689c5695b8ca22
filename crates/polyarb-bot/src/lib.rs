//! polyarb bot process.
//!
//! Hosts the live dashboard next to the trading engine:
//! - TOML configuration (dashboard settings + active strategy table)
//! - Logging with the dashboard log feed attached
//! - Dashboard server lifecycle

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
