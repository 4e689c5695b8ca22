//! Application configuration.

use crate::error::{AppError, AppResult};
use polyarb_dashboard::DashboardConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default configuration path.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Environment variable that overrides the configuration path.
pub const CONFIG_ENV_VAR: &str = "POLYARB_CONFIG";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Dashboard server settings.
    #[serde(default)]
    pub dashboard: DashboardConfig,
    /// Active strategy settings, published to viewers as the snapshot's `config` object.
    #[serde(default)]
    pub strategy: Map<String, Value>,
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        Self::from_toml_str(&content)
    }

    /// Parse TOML content.
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the dashboard cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        let dashboard = &self.dashboard;
        if dashboard.subscriber_capacity == 0 {
            return Err(AppError::Config(
                "dashboard.subscriber_capacity must be at least 1".to_string(),
            ));
        }
        if dashboard.max_log_lines == 0 {
            return Err(AppError::Config(
                "dashboard.max_log_lines must be at least 1".to_string(),
            ));
        }
        if dashboard.max_connections == 0 {
            return Err(AppError::Config(
                "dashboard.max_connections must be at least 1".to_string(),
            ));
        }
        if dashboard.keepalive_secs == 0 {
            return Err(AppError::Config(
                "dashboard.keepalive_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the config path: CLI arg > env var > default.
    pub fn resolve_path(cli: Option<String>) -> String {
        cli.or_else(|| std::env::var(CONFIG_ENV_VAR).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }
}
