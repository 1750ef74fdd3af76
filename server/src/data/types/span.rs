//! Normalized span record
//!
//! One OTEL span after extraction, ready for storage. A span is written once
//! at ingestion; the only later mutation is the `test_result_id` backfill
//! performed by the linker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::{SpanKind, StatusCode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEvent {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub attributes: Map<String, JsonValue>,
}

/// Reference to another span. No ownership is implied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanLink {
    pub trace_id: String,
    pub span_id: String,
    #[serde(default)]
    pub attributes: Map<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    // Identity
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,

    // Partitioning
    pub project_id: String,
    pub environment: String,

    pub span_name: String,
    pub span_kind: SpanKind,

    // Timing
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    // Status (message only kept for ERROR)
    pub status_code: StatusCode,
    pub status_message: Option<String>,

    pub attributes: Map<String, JsonValue>,
    pub events: Vec<SpanEvent>,
    pub links: Vec<SpanLink>,

    // Test correlation
    pub test_run_id: Option<String>,
    pub test_id: Option<String>,
    pub test_configuration_id: Option<String>,
    pub test_result_id: Option<String>,
}

impl Span {
    /// Duration in milliseconds (never negative for a validated span)
    pub fn duration_ms(&self) -> i64 {
        (self.end_time - self.start_time).num_milliseconds()
    }

    /// True when the span carries the run/test pair that marks test traffic
    pub fn has_test_context(&self) -> bool {
        self.test_run_id.is_some() && self.test_id.is_some()
    }
}
