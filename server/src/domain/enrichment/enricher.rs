//! Synchronous enrichment: per-trace summary computed from stored spans

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use crate::data::types::{Span, StatusCode, TraceEnrichment};
use crate::data::{DataError, TraceRepository};
use crate::domain::traces::SpanTreeBuilder;

#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("Storage error during enrichment: {0}")]
    Storage(#[from] DataError),
}

/// Enrichment callable used both by background workers and the sync fallback
#[async_trait]
pub trait TraceEnricher: Send + Sync {
    /// Enrich one trace. `None` when the trace has no stored spans.
    async fn enrich(
        &self,
        trace_id: &str,
        project_id: &str,
    ) -> Result<Option<TraceEnrichment>, EnrichError>;
}

pub struct SpanSummaryEnricher {
    repo: Arc<dyn TraceRepository>,
}

impl SpanSummaryEnricher {
    pub fn new(repo: Arc<dyn TraceRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl TraceEnricher for SpanSummaryEnricher {
    async fn enrich(
        &self,
        trace_id: &str,
        project_id: &str,
    ) -> Result<Option<TraceEnrichment>, EnrichError> {
        let spans = self.repo.get_trace_spans(project_id, trace_id).await?;
        let Some(summary) = summarize(project_id, trace_id, spans) else {
            return Ok(None);
        };
        self.repo.upsert_trace_enrichment(&summary).await?;
        tracing::debug!(
            trace_id,
            project_id,
            span_count = summary.span_count,
            root_count = summary.root_count,
            "Stored trace summary"
        );
        Ok(Some(summary))
    }
}

/// Summarize a trace's spans. Returns `None` for an empty list.
pub fn summarize(project_id: &str, trace_id: &str, spans: Vec<Span>) -> Option<TraceEnrichment> {
    let start_time = spans.iter().map(|s| s.start_time).min()?;
    let end_time = spans.iter().map(|s| s.end_time).max()?;
    let span_count = spans.len() as i64;
    let error_count = spans
        .iter()
        .filter(|s| s.status_code == StatusCode::Error)
        .count() as i64;
    let test_result_id = spans.iter().find_map(|s| s.test_result_id.clone());

    let forest = SpanTreeBuilder::build(spans);
    let root_span_name = forest.roots().next().map(|root| root.span().span_name.clone());

    Some(TraceEnrichment {
        project_id: project_id.to_string(),
        trace_id: trace_id.to_string(),
        span_count,
        root_count: forest.roots().len() as i64,
        error_count,
        root_span_name,
        start_time,
        end_time,
        duration_ms: (end_time - start_time).num_milliseconds(),
        test_result_id,
        enriched_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SqliteService;
    use crate::data::types::SpanKind;
    use chrono::{DateTime, TimeZone};
    use serde_json::Map;

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + chrono::Duration::milliseconds(ms)
    }

    fn span(id: &str, parent: Option<&str>, start_ms: i64, end_ms: i64, name: &str) -> Span {
        Span {
            trace_id: "b".repeat(32),
            span_id: format!("{id:0>16}"),
            parent_span_id: parent.map(|p| format!("{p:0>16}")),
            project_id: "default".into(),
            environment: "development".into(),
            span_name: name.into(),
            span_kind: SpanKind::Internal,
            start_time: t(start_ms),
            end_time: t(end_ms),
            status_code: StatusCode::Unset,
            status_message: None,
            attributes: Map::new(),
            events: vec![],
            links: vec![],
            test_run_id: None,
            test_id: None,
            test_configuration_id: None,
            test_result_id: None,
        }
    }

    #[test]
    fn test_summarize_counts_and_bounds() {
        let mut failing = span("2", Some("1"), 10, 40, "function.child");
        failing.status_code = StatusCode::Error;
        let orphan = span("3", Some("ff"), 5, 120, "function.orphan");
        let spans = vec![failing, span("1", None, 0, 50, "function.root"), orphan];

        let summary = summarize("default", &"b".repeat(32), spans).unwrap();
        assert_eq!(summary.span_count, 3);
        assert_eq!(summary.root_count, 2);
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.root_span_name.as_deref(), Some("function.root"));
        assert_eq!(summary.start_time, t(0));
        assert_eq!(summary.end_time, t(120));
        assert_eq!(summary.duration_ms, 120);
        assert!(summary.test_result_id.is_none());
    }

    #[test]
    fn test_summarize_empty() {
        assert!(summarize("default", &"b".repeat(32), vec![]).is_none());
    }

    #[tokio::test]
    async fn test_enricher_persists_summary() {
        let db = Arc::new(SqliteService::open_in_memory().await.unwrap());
        let mut root = span("1", None, 0, 30, "function.root");
        root.test_result_id = Some("44444444-4444-4444-8444-444444444444".into());
        db.insert_spans(&[root, span("2", Some("1"), 5, 10, "function.child")])
            .await
            .unwrap();

        let enricher = SpanSummaryEnricher::new(db.clone());
        let trace_id = "b".repeat(32);
        let summary = enricher.enrich(&trace_id, "default").await.unwrap().unwrap();
        assert_eq!(summary.span_count, 2);
        assert_eq!(summary.root_count, 1);

        let stored = db
            .get_trace_enrichment("default", &trace_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.span_count, 2);
        assert_eq!(
            stored.test_result_id.as_deref(),
            Some("44444444-4444-4444-8444-444444444444")
        );
    }

    #[tokio::test]
    async fn test_enricher_unknown_trace() {
        let db = Arc::new(SqliteService::open_in_memory().await.unwrap());
        let enricher = SpanSummaryEnricher::new(db);
        assert!(enricher.enrich(&"c".repeat(32), "default").await.unwrap().is_none());
    }
}
