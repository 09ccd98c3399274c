//! Record types persisted by the pipeline.
//!
//! Field names on the wire (`ts`, `type`, `url`, `value`) match the dump
//! files produced by the browser control panel.

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Current wall-clock time in milliseconds.
pub fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

/// A discrete occurrence, such as a control request and its reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "ts")]
    pub timestamp: Timestamp,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: Option<String>,
    pub value: String,
}

impl Event {
    pub fn new(
        timestamp: Timestamp,
        kind: impl Into<String>,
        url: Option<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            kind: kind.into(),
            url,
            value: value.into(),
        }
    }
}

/// A single timeseries sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(rename = "ts")]
    pub timestamp: Timestamp,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
}

impl Metric {
    pub fn new(timestamp: Timestamp, kind: impl Into<String>, value: f64) -> Self {
        Self {
            timestamp,
            kind: kind.into(),
            value,
        }
    }
}

/// A flushed run of metrics, persisted as one entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricBatch {
    pub value: Vec<Metric>,
}

/// The two persisted log namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Event,
    Metric,
}

impl Namespace {
    /// Key holding the namespace's next free index.
    pub fn count_key(self) -> &'static str {
        match self {
            Namespace::Event => "eventCount",
            Namespace::Metric => "metricCount",
        }
    }

    /// Key of the entry stored at `index`.
    pub fn entry_key(self, index: u64) -> String {
        match self {
            Namespace::Event => format!("event-{index}"),
            Namespace::Metric => format!("metric-{index}"),
        }
    }
}
