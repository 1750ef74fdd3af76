//! SQLite repositories
//!
//! Types (Span, TestExecutionRow, etc.) should be imported from `crate::data::types`.

use chrono::{DateTime, Utc};

use crate::data::sqlite::SqliteError;
use crate::utils::time::datetime_to_nanos;

pub mod enrichment;
pub mod span;
pub mod test_execution;

pub use enrichment::{get_trace_enrichment, upsert_trace_enrichment};
pub use span::{count_unlinked_spans, get_trace_spans, insert_spans, link_test_result};
pub use test_execution::{create_test_execution, get_test_execution, record_test_result};

/// Nanosecond column value, refusing timestamps the column cannot hold
fn to_nanos(dt: &DateTime<Utc>, column: &str) -> Result<i64, SqliteError> {
    datetime_to_nanos(dt)
        .ok_or_else(|| SqliteError::InvalidRow(format!("{column} out of storable range: {dt}")))
}
