//! polyarb-dashboard - Live telemetry hub for the polyarb bot.
//!
//! Pushes bot status and log lines to any number of browser viewers over
//! server-sent events without the bot ever waiting on a viewer.
//!
//! - `GET /`           → static viewer page
//! - `GET /api/state`  → current snapshot as JSON
//! - `GET /events`     → SSE stream (`init`, then `state` / `log`, `: keepalive` when idle)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐ update / append_log ┌──────────────┐ publish  ┌──────────────┐
//! │  bot engine  │ ──────────────────▶ │ SharedState  │ ───────▶ │ BroadcastHub │
//! │  (+ tracing) │    DashboardLog-    │ record + log │          │ N queues(50) │
//! └──────────────┘    Layer / LogSink  └──────────────┘          └──────┬───────┘
//!                                                                       │ try_send
//!                                         ┌─────────────────────────────┼──────┐
//!                                         ▼                             ▼      ▼
//!                                  StreamHandler ──▶ HTTP body   StreamHandler ...
//! ```
//!
//! A viewer whose queue fills up is dropped from the hub; its stream ends after
//! draining and the browser reconnects for a fresh `init`.
//!
//! # Usage
//!
//! ```ignore
//! use polyarb_dashboard::{run_server, DashboardConfig, DashboardLogLayer, SharedState};
//!
//! let config = DashboardConfig::default();
//! let state = SharedState::from_config(&config);
//! let log_layer = DashboardLogLayer::new(state.clone());
//!
//! tokio::spawn({
//!     let state = state.clone();
//!     async move {
//!         if let Err(e) = run_server(state, config).await {
//!             tracing::error!(error = %e, "Dashboard server failed");
//!         }
//!     }
//! });
//!
//! state.update([("status", serde_json::json!("scanning"))]);
//! ```

mod broadcast;
mod config;
mod error;
mod log_sink;
mod server;
mod state;
mod stream;
mod types;

pub use broadcast::{BroadcastHub, PublishOutcome, Recv, Subscriber, DEFAULT_SUBSCRIBER_CAPACITY};
pub use config::DashboardConfig;
pub use error::{DashboardError, DashboardResult};
pub use log_sink::{DashboardLogLayer, LogSink};
pub use server::{create_router, run_server, serve, AppState};
pub use state::{SharedState, DEFAULT_MAX_LOG_LINES};
pub use stream::{ConnState, Frame, StreamHandler, DEFAULT_KEEPALIVE, DEFAULT_LOG_REPLAY};
pub use types::{
    BotState, BotStatus, Event, EventKind, LogLine, PlanSnapshot, PositionSnapshot, Snapshot,
};
