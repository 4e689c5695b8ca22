//! Main application orchestration.
//!
//! Owns the dashboard state handle that the trading engine writes into and
//! runs the dashboard server until shutdown.

use crate::config::AppConfig;
use crate::error::AppResult;
use polyarb_dashboard::{run_server, BotStatus, DashboardLogLayer, SharedState};
use serde_json::Value;
use tracing::{error, info};

/// Main application.
pub struct Application {
    config: AppConfig,
    state: SharedState,
}

impl Application {
    /// Create the application and publish the active configuration.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let state = SharedState::from_config(&config.dashboard);
        state.update([("config", Value::Object(config.strategy.clone()))]);
        state.set_field("status", BotStatus::Starting)?;

        Ok(Self { config, state })
    }

    /// Handle the trading engine uses to push status and log lines.
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Tracing layer that mirrors log records into the dashboard.
    pub fn log_layer(&self) -> DashboardLogLayer<SharedState> {
        DashboardLogLayer::new(self.state.clone())
            .with_max_level(self.config.dashboard.log_level_filter())
    }

    /// Install global logging with the dashboard feed attached.
    pub fn init_logging(&self) -> AppResult<()> {
        polyarb_telemetry::init_logging(Some(self.log_layer()))?;
        Ok(())
    }

    /// Run until Ctrl-C or until the dashboard server fails.
    pub async fn run(self) -> AppResult<()> {
        let dashboard = self.config.dashboard.clone();

        let result: AppResult<()> = if dashboard.enabled {
            info!(
                bind = %dashboard.bind_address,
                port = dashboard.port,
                "Dashboard enabled"
            );
            tokio::select! {
                result = run_server(self.state.clone(), dashboard) => {
                    if let Err(e) = &result {
                        error!(error = %e, "Dashboard server failed");
                    }
                    result.map_err(Into::into)
                }
                signal = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested");
                    signal.map_err(Into::into)
                }
            }
        } else {
            info!("Dashboard disabled, waiting for shutdown");
            tokio::signal::ctrl_c().await.map_err(Into::into)
        };

        self.state.set_field("status", BotStatus::Stopped)?;
        info!("Stopped");
        result
    }
}
