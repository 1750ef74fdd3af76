#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span};
use tokio::sync::watch;

use spanlink_server::data::{SqliteService, TraceRepository};
use spanlink_server::domain::enrichment::{
    EnrichmentOrchestrator, LocalWorkerPool, SpanSummaryEnricher, TraceEnricher, WorkerPool,
};
use spanlink_server::domain::linking::TraceResultLinker;
use spanlink_server::domain::traces::TraceIngestGateway;
use spanlink_server::utils::otlp::keys;

pub const T0: u64 = 1_700_000_000_000_000_000;
pub const RUN: &str = "11111111-1111-4111-8111-111111111111";
pub const TEST: &str = "22222222-2222-4222-8222-222222222222";
pub const CONFIG: &str = "33333333-3333-4333-8333-333333333333";
pub const RESULT: &str = "44444444-4444-4444-8444-444444444444";

pub fn kv(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(any_value::Value::StringValue(value.to_string())),
        }),
    }
}

pub fn otlp_span(trace: u8, span: u8, parent: Option<u8>, name: &str) -> Span {
    Span {
        trace_id: vec![trace; 16],
        span_id: vec![span; 8],
        parent_span_id: parent.map(|p| vec![p; 8]).unwrap_or_default(),
        name: name.to_string(),
        start_time_unix_nano: T0 + span as u64 * 1_000_000,
        end_time_unix_nano: T0 + span as u64 * 1_000_000 + 500_000,
        ..Default::default()
    }
}

pub fn request(resource_attrs: Vec<KeyValue>, spans: Vec<Span>) -> ExportTraceServiceRequest {
    ExportTraceServiceRequest {
        resource_spans: vec![ResourceSpans {
            resource: Some(Resource {
                attributes: resource_attrs,
                ..Default::default()
            }),
            scope_spans: vec![ScopeSpans {
                spans,
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

pub fn test_context() -> Vec<KeyValue> {
    vec![
        kv(keys::TEST_RUN_ID, RUN),
        kv(keys::TEST_ID, TEST),
        kv(keys::TEST_CONFIGURATION_ID, CONFIG),
    ]
}

pub fn trace_hex(byte: u8) -> String {
    hex::encode([byte; 16])
}

pub struct Harness {
    pub db: Arc<SqliteService>,
    pub linker: Arc<TraceResultLinker>,
    pub gateway: Arc<TraceIngestGateway>,
    pub shutdown_tx: watch::Sender<bool>,
}

/// In-memory stack with `workers` local enrichment workers
pub async fn harness(workers: usize) -> Harness {
    let db = Arc::new(SqliteService::open_in_memory().await.unwrap());
    let repo: Arc<dyn TraceRepository> = db.clone();
    let enricher: Arc<dyn TraceEnricher> = Arc::new(SpanSummaryEnricher::new(repo.clone()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (pool, _) = LocalWorkerPool::spawn(workers, 16, enricher.clone(), shutdown_rx);
    let pool: Arc<dyn WorkerPool> = Arc::new(pool);
    let orchestrator = Arc::new(EnrichmentOrchestrator::new(
        pool,
        enricher,
        Duration::from_millis(200),
    ));
    let linker = Arc::new(TraceResultLinker::new(repo.clone()));
    let gateway = Arc::new(TraceIngestGateway::new(repo, linker.clone(), orchestrator));
    Harness {
        db,
        linker,
        gateway,
        shutdown_tx,
    }
}
