//! Dashboard data types.
//!
//! The status record is kept as a JSON object so producers can push any field
//! without a schema change here. [`BotState`] is the fixed field set the viewer
//! page renders: it seeds the record at startup and gives typed access to a
//! [`Snapshot`] through [`Snapshot::decode`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One formatted log line.
pub type LogLine = String;

/// Bot lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
    #[default]
    Starting,
    Scanning,
    Waiting,
    Trading,
    Resolved,
    Stopped,
}

/// Most recent arbitrage plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanSnapshot {
    /// Combined cost of both legs after fees.
    pub combined_net: f64,
    /// Margin after fees (fraction, 0.02 = 2%).
    pub margin_net: f64,
    /// Margin computed against the VWAP of the filled depth.
    pub vwap_margin: f64,
    /// Total capital the plan commits.
    pub total_cost: f64,
    /// Expected profit at resolution.
    pub expected_profit: f64,
}

/// Open paired position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionSnapshot {
    pub market_title: String,
    /// Number of matched UP/DOWN pairs held.
    pub pairs: f64,
    pub total_invested: f64,
    pub expected_profit: f64,
}

/// Full status record in wire order.
///
/// Absent numeric fields decode as 0; optional fields as `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotState {
    pub status: BotStatus,

    // Market
    pub current_market: String,
    pub market_asset: String,
    pub market_duration: String,
    pub market_ends: String,
    pub markets_found: u64,
    pub windows_scanned: u64,

    // Order book
    pub up_best_ask: f64,
    pub up_best_bid: f64,
    pub down_best_ask: f64,
    pub down_best_bid: f64,
    pub combined_ask: f64,
    pub up_depth: f64,
    pub down_depth: f64,
    pub fee_bps: u32,

    // Capital
    pub bankroll: f64,
    pub deployed: f64,
    pub available: f64,
    pub realized_pnl: f64,
    pub daily_spent: f64,
    pub exchange_balance: Option<f64>,

    // Strategy
    pub opportunities_seen: u64,
    pub opportunities_traded: u64,
    pub last_plan: Option<PlanSnapshot>,

    // Execution
    pub fill_rate: String,
    pub api_stats: String,

    pub positions: Vec<PositionSnapshot>,

    /// Active strategy configuration, rendered as-is.
    pub config: Map<String, Value>,
}

impl BotState {
    /// The default record as a JSON object, in field order.
    pub fn default_fields() -> Map<String, Value> {
        match serde_json::to_value(Self::default()) {
            Ok(Value::Object(fields)) => fields,
            _ => Map::new(),
        }
    }
}

/// Immutable copy of the status record at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    fields: Map<String, Value>,
}

impl Snapshot {
    pub(crate) fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Raw value of a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// All fields, in record order.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Current status, if the field holds a known status name.
    pub fn status(&self) -> Option<BotStatus> {
        self.get("status")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Typed view of the fixed field set. Unknown fields are ignored.
    pub fn decode(&self) -> Result<BotState, serde_json::Error> {
        serde_json::from_value(Value::Object(self.fields.clone()))
    }
}

/// Wire name of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Init,
    State,
    Log,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Init => "init",
            EventKind::State => "state",
            EventKind::Log => "log",
        }
    }
}

/// Event delivered to viewers.
///
/// Snapshots are shared by `Arc` so a publish clones a pointer per subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Initial state plus recent log replay (sent once on connect).
    Init {
        state: Arc<Snapshot>,
        logs: Vec<LogLine>,
    },
    /// Full state after an update.
    State(Arc<Snapshot>),
    /// One new log line.
    Log(LogLine),
}

#[derive(Serialize)]
struct InitData<'a> {
    state: &'a Snapshot,
    logs: &'a [LogLine],
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Init { .. } => EventKind::Init,
            Event::State(_) => EventKind::State,
            Event::Log(_) => EventKind::Log,
        }
    }

    /// JSON payload carried on the `data:` line.
    pub fn data_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Event::Init { state, logs } => serde_json::to_string(&InitData {
                state: state.as_ref(),
                logs,
            }),
            Event::State(snapshot) => serde_json::to_string(snapshot.as_ref()),
            Event::Log(line) => serde_json::to_string(line),
        }
    }
}
