//! Data storage layer
//!
//! - `sqlite` - Transactional store for spans, test executions and enrichments
//! - `types` - Shared record types
//! - `traits` - Repository trait implemented by the SQLite backend
//! - `error` - Unified error type

pub mod error;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use error::DataError;
pub use sqlite::SqliteService;
pub use traits::TraceRepository;
pub use types::{
    Span, SpanEvent, SpanKind, SpanLink, StatusCode, TestExecutionKey, TestExecutionRow,
    TraceEnrichment,
};
