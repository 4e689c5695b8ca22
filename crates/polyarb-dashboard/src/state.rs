//! Shared dashboard state.
//!
//! `SharedState` is the single writer path for the status record and the
//! rolling log buffer. Every mutation publishes through the [`BroadcastHub`]
//! while the state lock is still held, so all viewers observe events in the
//! order the mutations happened. The hub never takes the state lock.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::broadcast::{BroadcastHub, PublishOutcome, Subscriber};
use crate::config::DashboardConfig;
use crate::error::DashboardResult;
use crate::types::{BotState, Event, LogLine, Snapshot};

/// Default size of the rolling log buffer.
pub const DEFAULT_MAX_LOG_LINES: usize = 500;

struct StateData {
    record: Map<String, Value>,
    logs: VecDeque<LogLine>,
}

struct StateInner {
    data: Mutex<StateData>,
    hub: BroadcastHub,
    max_log_lines: usize,
}

/// Thread-safe status record plus recent log lines.
///
/// Cheap to clone; all clones share the same state and hub.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<StateInner>,
}

impl SharedState {
    /// Create state seeded with the default [`BotState`] fields.
    pub fn new(hub: BroadcastHub, max_log_lines: usize) -> Self {
        let max_log_lines = max_log_lines.max(1);
        Self {
            inner: Arc::new(StateInner {
                data: Mutex::new(StateData {
                    record: BotState::default_fields(),
                    logs: VecDeque::with_capacity(max_log_lines),
                }),
                hub,
                max_log_lines,
            }),
        }
    }

    /// Create state and hub sized from configuration.
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(
            BroadcastHub::new(config.subscriber_capacity),
            config.max_log_lines,
        )
    }

    /// Hub this state publishes through.
    pub fn hub(&self) -> &BroadcastHub {
        &self.inner.hub
    }

    /// Merge fields into the status record and publish the new snapshot.
    ///
    /// Field names are not validated; unknown fields are stored and sent.
    /// `fields` is fully consumed before the lock is taken, so it may log.
    pub fn update<I, K>(&self, fields: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let fields: Vec<(String, Value)> =
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let outcome = {
            let mut data = self.inner.data.lock();
            data.record.extend(fields);
            let snapshot = Arc::new(Snapshot::from_fields(data.record.clone()));
            self.inner.hub.publish(&Event::State(snapshot))
        };
        log_publish("state", outcome);
    }

    /// Set one field from any serializable value.
    ///
    /// Nothing is stored or published if the value does not serialize.
    pub fn set_field<T: Serialize>(&self, key: &str, value: T) -> DashboardResult<()> {
        let value = serde_json::to_value(value)?;
        self.update([(key, value)]);
        Ok(())
    }

    /// Append a log line, trim the buffer and publish the line.
    pub fn append_log(&self, line: impl Into<LogLine>) {
        let line = line.into();
        let outcome = {
            let mut data = self.inner.data.lock();
            data.logs.push_back(line.clone());
            while data.logs.len() > self.inner.max_log_lines {
                data.logs.pop_front();
            }
            self.inner.hub.publish(&Event::Log(line))
        };
        log_publish("log", outcome);
    }

    /// Independent copy of the current status record.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_fields(self.inner.data.lock().record.clone())
    }

    /// Last `min(n, len)` log lines, oldest first.
    pub fn recent_logs(&self, n: usize) -> Vec<LogLine> {
        let data = self.inner.data.lock();
        let skip = data.logs.len().saturating_sub(n);
        data.logs.iter().skip(skip).cloned().collect()
    }

    /// Capture an `Init` event and subscribe in one step.
    ///
    /// Both happen under the state lock, so the subscriber receives exactly
    /// the events published after the captured snapshot.
    pub fn open_stream(&self, log_replay: usize) -> (Event, Subscriber) {
        let data = self.inner.data.lock();
        let skip = data.logs.len().saturating_sub(log_replay);
        let init = Event::Init {
            state: Arc::new(Snapshot::from_fields(data.record.clone())),
            logs: data.logs.iter().skip(skip).cloned().collect(),
        };
        let subscriber = self.inner.hub.subscribe();
        (init, subscriber)
    }

    /// Number of buffered log lines.
    pub fn log_len(&self) -> usize {
        self.inner.data.lock().logs.len()
    }

    /// Log buffer bound.
    pub fn max_log_lines(&self) -> usize {
        self.inner.max_log_lines
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(BroadcastHub::default(), DEFAULT_MAX_LOG_LINES)
    }
}

impl std::fmt::Debug for SharedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedState")
            .field("log_len", &self.log_len())
            .field("max_log_lines", &self.inner.max_log_lines)
            .field("hub", &self.inner.hub)
            .finish()
    }
}

fn log_publish(kind: &'static str, outcome: PublishOutcome) {
    if outcome.dropped > 0 {
        debug!(
            kind,
            delivered = outcome.delivered,
            dropped = outcome.dropped,
            "Dropped slow dashboard viewers"
        );
    }
}
