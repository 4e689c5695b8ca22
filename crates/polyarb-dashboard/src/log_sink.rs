//! Forwarding of producer log records into the dashboard.
//!
//! [`DashboardLogLayer`] is a `tracing_subscriber` layer that formats each
//! event into one line and hands it to a [`LogSink`]. `SharedState` is the
//! sink used in production.

use std::fmt::{self, Write as _};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::state::SharedState;

/// Events from this crate never reach the sink: the sink publishes, and
/// publishing must not feed back into itself.
const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Receiver of formatted log lines.
pub trait LogSink: Send + Sync + 'static {
    fn consume(&self, line: String);
}

impl LogSink for SharedState {
    fn consume(&self, line: String) {
        self.append_log(line);
    }
}

impl<T: LogSink> LogSink for Arc<T> {
    fn consume(&self, line: String) {
        (**self).consume(line);
    }
}

/// Layer that feeds formatted events into a [`LogSink`].
pub struct DashboardLogLayer<S> {
    sink: S,
    max_level: Level,
}

impl<S: LogSink> DashboardLogLayer<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            max_level: Level::INFO,
        }
    }

    /// Forward only events at `level` or more severe.
    pub fn with_max_level(mut self, level: Level) -> Self {
        self.max_level = level;
        self
    }
}

impl<S, Sub> Layer<Sub> for DashboardLogLayer<S>
where
    S: LogSink,
    Sub: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, Sub>) {
        let metadata = event.metadata();
        if *metadata.level() > self.max_level || is_own_target(metadata.target()) {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let time = chrono::Local::now().format("%H:%M:%S").to_string();
        self.sink
            .consume(format_line(&time, metadata.level(), &visitor.message, &visitor.fields));
    }
}

fn is_own_target(target: &str) -> bool {
    target
        .strip_prefix(OWN_TARGET)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

/// `HH:MM:SS [LEVEL] message key=value ...`
fn format_line(time: &str, level: &Level, message: &str, fields: &str) -> String {
    let mut line = format!("{time} [{level}] {message}");
    line.push_str(fields);
    line
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Default)]
    struct Capture(Mutex<Vec<String>>);

    impl LogSink for Capture {
        fn consume(&self, line: String) {
            self.0.lock().push(line);
        }
    }

    fn with_layer(level: Level, f: impl FnOnce()) -> Vec<String> {
        let capture = Arc::new(Capture::default());
        let subscriber = tracing_subscriber::registry()
            .with(DashboardLogLayer::new(capture.clone()).with_max_level(level));
        tracing::subscriber::with_default(subscriber, f);
        let lines = capture.0.lock().clone();
        lines
    }

    #[test]
    fn test_format_line() {
        assert_eq!(
            format_line("12:00:01", &Level::WARN, "book stale", " market=btc-15m"),
            "12:00:01 [WARN] book stale market=btc-15m"
        );
    }

    #[test]
    fn test_layer_formats_message_and_fields() {
        let lines = with_layer(Level::INFO, || {
            tracing::info!(target: "polyarb_bot", market = "btc-15m", combined = 0.97, "ARB FOUND");
        });

        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert!(line.contains(" [INFO] ARB FOUND"), "{line}");
        assert!(line.ends_with(" market=btc-15m combined=0.97"), "{line}");
    }

    #[test]
    fn test_layer_respects_level() {
        let lines = with_layer(Level::WARN, || {
            tracing::info!(target: "polyarb_bot", "quiet");
            tracing::debug!(target: "polyarb_bot", "quieter");
            tracing::error!(target: "polyarb_bot", "loud");
        });

        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("[ERROR] loud"));
    }

    #[test]
    fn test_layer_ignores_own_crate_events() {
        let lines = with_layer(Level::TRACE, || {
            tracing::info!("from the dashboard itself");
            tracing::info!(target: "polyarb_bot", "from the bot");
        });

        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("from the bot"));
    }

    #[test]
    fn test_own_target_matches_whole_path_segments() {
        assert!(is_own_target(OWN_TARGET));
        assert!(is_own_target(&format!("{OWN_TARGET}::state")));
        assert!(!is_own_target(&format!("{OWN_TARGET}_ext")));
        assert!(!is_own_target("polyarb_bot"));

        let lines = with_layer(Level::INFO, || {
            tracing::info!(target: "polyarb_dashboard_ext", "neighbour crate");
        });
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_update_with_logging_iterator_completes() {
        let state = SharedState::default();
        let producer = state.clone();
        let (done_tx, done_rx) = std::sync::mpsc::channel();

        std::thread::spawn(move || {
            let subscriber =
                tracing_subscriber::registry().with(DashboardLogLayer::new(producer.clone()));
            tracing::subscriber::with_default(subscriber, || {
                producer.update((0..2).map(|n| {
                    tracing::info!(target: "polyarb_bot", n, "computing field");
                    (format!("field_{n}"), serde_json::json!(n))
                }));
            });
            let _ = done_tx.send(());
        });

        done_rx
            .recv_timeout(std::time::Duration::from_secs(3))
            .expect("update returned");
        assert_eq!(state.snapshot().get("field_1"), Some(&serde_json::json!(1)));
        assert_eq!(state.log_len(), 2);
        assert!(state.recent_logs(1)[0].contains("computing field n=1"));
    }

    #[test]
    fn test_shared_state_as_sink() {
        let state = SharedState::default();
        let mut sub = state.hub().subscribe();

        let subscriber = tracing_subscriber::registry().with(DashboardLogLayer::new(state.clone()));
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "polyarb_bot::engine", "window skipped");
        });

        let logs = state.recent_logs(10);
        assert_eq!(logs.len(), 1);
        assert!(logs[0].ends_with("[WARN] window skipped"));
        assert_eq!(sub.try_recv(), Some(crate::types::Event::Log(logs[0].clone())));
    }
}
