//! HTTP server implementation using axum.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderName, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::DashboardConfig;
use crate::error::{DashboardError, DashboardResult};
use crate::state::SharedState;
use crate::stream::StreamHandler;
use crate::types::Snapshot;

/// Connection limiter to cap concurrent event streams.
pub struct ConnectionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(ConnectionGuard {
                    limiter: Arc::clone(self),
                });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }
}

/// Holds one connection slot; owned by the response body so the slot is
/// released when the stream ends.
pub struct ConnectionGuard {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let remaining = self
            .limiter
            .current
            .fetch_sub(1, Ordering::Release)
            .saturating_sub(1);
        debug!(connections = remaining, "Viewer disconnected");
    }
}

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    shared: SharedState,
    connection_limiter: Arc<ConnectionLimiter>,
    config: Arc<DashboardConfig>,
}

impl AppState {
    pub fn new(shared: SharedState, config: DashboardConfig) -> Self {
        Self {
            shared,
            connection_limiter: Arc::new(ConnectionLimiter::new(config.max_connections)),
            config: Arc::new(config),
        }
    }

    pub fn active_streams(&self) -> usize {
        self.connection_limiter.current_count()
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/index.html", get(serve_index))
        .route("/api/state", get(get_state))
        .route("/events", get(events_handler))
        .fallback(not_found)
        .with_state(state)
}

/// Serve the viewer page.
async fn serve_index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

/// Current snapshot as JSON.
async fn get_state(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.shared.snapshot())
}

async fn not_found(uri: Uri) -> DashboardError {
    DashboardError::NotFound(uri.path().to_string())
}

/// Open a server-sent event stream.
async fn events_handler(State(state): State<AppState>) -> Response {
    let guard = match state.connection_limiter.try_acquire() {
        Some(guard) => guard,
        None => {
            warn!(
                current = state.connection_limiter.current_count(),
                max = state.config.max_connections,
                "Dashboard stream limit reached"
            );
            return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
        }
    };

    let handler = StreamHandler::connect(
        &state.shared,
        state.config.log_replay,
        state.config.keepalive_interval(),
    );

    info!(
        connections = state.connection_limiter.current_count(),
        "Viewer connected"
    );

    let frames = handler.into_body_stream().map(move |frame| {
        let _slot = &guard;
        frame
    });

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}

/// Serve the dashboard on an already bound listener.
pub async fn serve(listener: TcpListener, state: AppState) -> DashboardResult<()> {
    let app = create_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Bind and run the dashboard HTTP server.
pub async fn run_server(shared: SharedState, config: DashboardConfig) -> DashboardResult<()> {
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| DashboardError::Bind {
            addr: addr.clone(),
            source,
        })?;

    info!(addr = %addr, "Starting dashboard server");
    serve(listener, AppState::new(shared, config)).await
}
