//! Dashboard configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Dashboard server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Enable dashboard server.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Address to bind the HTTP listener to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Number of log lines kept in the rolling buffer.
    #[serde(default = "default_max_log_lines")]
    pub max_log_lines: usize,
    /// Number of log lines replayed to a viewer on connect.
    #[serde(default = "default_log_replay")]
    pub log_replay: usize,
    /// Per-viewer event queue capacity. A viewer that falls this far behind is dropped.
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,
    /// Idle seconds before a keepalive frame is written to a viewer.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    /// Maximum concurrent event streams.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Minimum level of log records forwarded to viewers.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_log_lines() -> usize {
    500
}

fn default_log_replay() -> usize {
    200
}

fn default_subscriber_capacity() -> usize {
    50
}

fn default_keepalive_secs() -> u64 {
    15
}

fn default_max_connections() -> usize {
    32
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
            max_log_lines: default_max_log_lines(),
            log_replay: default_log_replay(),
            subscriber_capacity: default_subscriber_capacity(),
            keepalive_secs: default_keepalive_secs(),
            max_connections: default_max_connections(),
            log_level: default_log_level(),
        }
    }
}

impl DashboardConfig {
    /// Keepalive interval as a `Duration`.
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    /// Parsed log level threshold. Unknown names fall back to INFO.
    pub fn log_level_filter(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}
