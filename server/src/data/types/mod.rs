//! Shared data types
//!
//! Row and record types exchanged between the domain layer and the
//! repository implementations.

mod enrichment;
mod enums;
mod span;
mod test_execution;

pub use enrichment::TraceEnrichment;
pub use enums::{SpanKind, StatusCode};
pub use span::{Span, SpanEvent, SpanLink};
pub use test_execution::{TestExecutionKey, TestExecutionRow};
