mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use common::{otlp_span, request, trace_hex};
use spanlink_server::data::types::TraceEnrichment;
use spanlink_server::data::{DataError, SqliteService, TraceRepository};
use spanlink_server::domain::enrichment::{
    EnrichError, EnrichmentJob, EnrichmentOrchestrator, TraceEnricher, WorkerError, WorkerPool,
};
use spanlink_server::domain::linking::TraceResultLinker;
use spanlink_server::domain::traces::TraceIngestGateway;

/// Pool whose workers never answer the liveness probe
struct SilentPool;

#[async_trait]
impl WorkerPool for SilentPool {
    async fn enqueue(&self, _job: EnrichmentJob) -> Result<(), WorkerError> {
        Err(WorkerError::Closed)
    }

    async fn ping(&self, _timeout: Duration) -> Result<Vec<String>, WorkerError> {
        std::future::pending().await
    }
}

/// Pool that answers the probe but cannot accept jobs
struct FullPool;

#[async_trait]
impl WorkerPool for FullPool {
    async fn enqueue(&self, _job: EnrichmentJob) -> Result<(), WorkerError> {
        Err(WorkerError::QueueFull)
    }

    async fn ping(&self, _timeout: Duration) -> Result<Vec<String>, WorkerError> {
        Ok(vec!["worker-0".into()])
    }
}

struct BrokenEnricher;

#[async_trait]
impl TraceEnricher for BrokenEnricher {
    async fn enrich(
        &self,
        _trace_id: &str,
        _project_id: &str,
    ) -> Result<Option<TraceEnrichment>, EnrichError> {
        Err(EnrichError::Storage(DataError::InvalidRow("corrupt".into())))
    }
}

async fn gateway(pool: Arc<dyn WorkerPool>) -> (Arc<SqliteService>, TraceIngestGateway) {
    let db = Arc::new(SqliteService::open_in_memory().await.unwrap());
    let orchestrator = Arc::new(EnrichmentOrchestrator::new(
        pool,
        Arc::new(BrokenEnricher),
        Duration::from_millis(50),
    ));
    let linker = Arc::new(TraceResultLinker::new(db.clone()));
    (db.clone(), TraceIngestGateway::new(db, linker, orchestrator))
}

#[tokio::test]
async fn hung_probe_and_failing_enricher_still_accept_batch() {
    let (db, gateway) = gateway(Arc::new(SilentPool)).await;
    let req = request(vec![], vec![otlp_span(0x0e, 1, None, "function.main")]);

    let report = tokio::time::timeout(Duration::from_secs(2), gateway.export(&req, None))
        .await
        .expect("probe timeout must bound the export")
        .unwrap();

    assert_eq!(report.persisted, 1);
    assert_eq!(report.enrichment.executed_sync, 1);
    assert_eq!(report.enrichment.dispatched_async, 0);
    assert_eq!(
        db.get_trace_spans("default", &trace_hex(0x0e)).await.unwrap().len(),
        1
    );
    assert!(db
        .get_trace_enrichment("default", &trace_hex(0x0e))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn full_queue_falls_back_to_sync() {
    let (_db, gateway) = gateway(Arc::new(FullPool)).await;
    let req = request(
        vec![],
        vec![
            otlp_span(0x0f, 1, None, "function.a"),
            otlp_span(0x1f, 2, None, "function.b"),
        ],
    );

    let report = gateway.export(&req, None).await.unwrap();
    assert_eq!(report.enrichment.executed_sync, 2);
    assert_eq!(report.enrichment.dispatched_async, 0);
}

#[tokio::test]
async fn live_workers_take_the_jobs() {
    let h = common::harness(2).await;
    let req = request(vec![], vec![otlp_span(0x2a, 1, None, "function.main")]);

    let report = h.gateway.export(&req, None).await.unwrap();
    assert_eq!(report.enrichment.dispatched_async, 1);
    assert_eq!(report.enrichment.executed_sync, 0);

    let trace_id = trace_hex(0x2a);
    let mut enriched = None;
    for _ in 0..50 {
        enriched = h.db.get_trace_enrichment("default", &trace_id).await.unwrap();
        if enriched.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(enriched.unwrap().span_count, 1);

    let _ = h.shutdown_tx.send(true);
}
