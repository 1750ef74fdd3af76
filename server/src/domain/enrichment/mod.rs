//! Post-ingestion trace enrichment
//!
//! - `worker` - Background worker pool with a bounded job queue and a ping probe
//! - `enricher` - Synchronous enrichment computation over a trace's spans
//! - `orchestrator` - Async-preferred, sync-fallback dispatch per trace

mod enricher;
mod orchestrator;
mod worker;

pub use enricher::{EnrichError, SpanSummaryEnricher, TraceEnricher, summarize};
pub use orchestrator::{Dispatch, DispatchCounts, EnrichmentOrchestrator, WorkerAvailability};
pub use worker::{EnrichmentJob, LocalWorkerPool, WorkerError, WorkerPool};
