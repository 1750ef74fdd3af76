//! Domain logic
//!
//! - `traces` - OTLP ingestion, span validation and tree reconstruction
//! - `linking` - Trace ↔ test-result correlation
//! - `enrichment` - Post-ingestion trace summaries and worker dispatch

pub mod enrichment;
pub mod linking;
pub mod traces;

pub use enrichment::{EnrichmentOrchestrator, LocalWorkerPool, SpanSummaryEnricher};
pub use linking::TraceResultLinker;
pub use traces::{SpanTreeBuilder, TraceIngestGateway};
