use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-trace summary produced by enrichment and stored in `trace_enrichments`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEnrichment {
    pub project_id: String,
    pub trace_id: String,
    pub span_count: i64,
    pub root_count: i64,
    pub error_count: i64,
    pub root_span_name: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
    pub test_result_id: Option<String>,
    pub enriched_at: DateTime<Utc>,
}
