//! Trace ingestion and rendering
//!
//! - `validate` - Per-span record invariants
//! - `normalize` - OTLP export request → `Span` records
//! - `ingest` - Gateway: normalize, persist, link, enrich
//! - `tree` - Flat span list → forest

mod ingest;
mod normalize;
mod tree;
mod validate;

pub use ingest::{IngestError, IngestReport, TraceIngestGateway};
pub use normalize::{DroppedSpan, NormalizedBatch, normalize_request};
pub use tree::{SpanForest, SpanTreeBuilder, SpanTreeNode};
pub use validate::{SpanValidationError, is_valid_span_name, validate_span};
