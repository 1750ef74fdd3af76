mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use common::{harness, otlp_span, request, trace_hex};
use spanlink_server::data::types::{Span, TestExecutionKey, TestExecutionRow, TraceEnrichment};
use spanlink_server::data::{DataError, TraceRepository};
use spanlink_server::domain::enrichment::{
    EnrichmentOrchestrator, LocalWorkerPool, SpanSummaryEnricher,
};
use spanlink_server::domain::linking::TraceResultLinker;
use spanlink_server::domain::traces::{IngestError, TraceIngestGateway};

#[tokio::test]
async fn failing_row_rolls_back_whole_batch() {
    let h = harness(0).await;
    sqlx::query(
        r#"CREATE TRIGGER reject_poison BEFORE INSERT ON spans
           WHEN NEW.span_name = 'function.poison'
           BEGIN SELECT RAISE(ABORT, 'poisoned span'); END"#,
    )
    .execute(h.db.pool())
    .await
    .unwrap();

    let req = request(
        vec![],
        vec![
            otlp_span(0x7a, 1, None, "function.root"),
            otlp_span(0x7a, 2, Some(1), "function.child"),
            otlp_span(0x7a, 3, Some(1), "function.poison"),
        ],
    );

    let err = h.gateway.export(&req, None).await.unwrap_err();
    assert!(matches!(err, IngestError::Persistence(_)));

    let spans = h.db.get_trace_spans("default", &trace_hex(0x7a)).await.unwrap();
    assert!(spans.is_empty());
    assert!(h
        .db
        .get_trace_enrichment("default", &trace_hex(0x7a))
        .await
        .unwrap()
        .is_none());
}

/// Store that is down for every call
struct UnavailableRepository;

fn down() -> DataError {
    DataError::Io(std::io::Error::other("database unavailable"))
}

#[async_trait]
impl TraceRepository for UnavailableRepository {
    async fn insert_spans(&self, _spans: &[Span]) -> Result<u64, DataError> {
        Err(down())
    }

    async fn get_trace_spans(
        &self,
        _project_id: &str,
        _trace_id: &str,
    ) -> Result<Vec<Span>, DataError> {
        Err(down())
    }

    async fn link_test_result(
        &self,
        _key: &TestExecutionKey,
        _test_result_id: &str,
    ) -> Result<u64, DataError> {
        Err(down())
    }

    async fn count_unlinked_spans(&self, _older_than: DateTime<Utc>) -> Result<u64, DataError> {
        Err(down())
    }

    async fn get_test_execution(
        &self,
        _key: &TestExecutionKey,
    ) -> Result<Option<TestExecutionRow>, DataError> {
        Err(down())
    }

    async fn create_test_execution(
        &self,
        _key: &TestExecutionKey,
    ) -> Result<TestExecutionRow, DataError> {
        Err(down())
    }

    async fn record_test_result(
        &self,
        _key: &TestExecutionKey,
        _test_result_id: &str,
    ) -> Result<TestExecutionRow, DataError> {
        Err(down())
    }

    async fn upsert_trace_enrichment(&self, _enrichment: &TraceEnrichment) -> Result<(), DataError> {
        Err(down())
    }

    async fn get_trace_enrichment(
        &self,
        _project_id: &str,
        _trace_id: &str,
    ) -> Result<Option<TraceEnrichment>, DataError> {
        Err(down())
    }
}

#[tokio::test]
async fn unavailable_store_reports_persistence_error() {
    let repo: Arc<dyn TraceRepository> = Arc::new(UnavailableRepository);
    let enricher = Arc::new(SpanSummaryEnricher::new(repo.clone()));
    let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let (pool, _) = LocalWorkerPool::spawn(0, 1, enricher.clone(), shutdown_rx);
    let orchestrator = Arc::new(EnrichmentOrchestrator::new(
        Arc::new(pool),
        enricher,
        Duration::from_millis(50),
    ));
    let linker = Arc::new(TraceResultLinker::new(repo.clone()));
    let gateway = TraceIngestGateway::new(repo, linker, orchestrator);

    let req = request(vec![], vec![otlp_span(0x7b, 1, None, "function.main")]);
    let err = gateway.export(&req, None).await.unwrap_err();
    assert!(matches!(err, IngestError::Persistence(_)));
}
