//! Repository traits for database backends
//!
//! The domain layer talks to storage only through these traits so that
//! ingestion, linking and enrichment can be exercised against fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::data::error::DataError;
use crate::data::types::{Span, TestExecutionKey, TestExecutionRow, TraceEnrichment};

/// Span persistence and trace/test-result correlation
#[async_trait]
pub trait TraceRepository: Send + Sync {
    // ==================== Span Operations ====================

    /// Persist a batch of spans in a single transaction.
    ///
    /// Either every span is written or none is. Spans whose
    /// `(trace_id, span_id)` already exists are ignored; returns the number of
    /// rows actually inserted.
    async fn insert_spans(&self, spans: &[Span]) -> Result<u64, DataError>;

    /// All spans of a trace in insertion order
    async fn get_trace_spans(&self, project_id: &str, trace_id: &str)
    -> Result<Vec<Span>, DataError>;

    /// Set `test_result_id` on every span bearing `key` that does not have one yet.
    ///
    /// Returns the number of spans updated; zero is a normal outcome.
    async fn link_test_result(
        &self,
        key: &TestExecutionKey,
        test_result_id: &str,
    ) -> Result<u64, DataError>;

    /// Test-context spans ingested before `older_than` that are still unlinked
    async fn count_unlinked_spans(&self, older_than: DateTime<Utc>) -> Result<u64, DataError>;

    // ==================== Test Execution Operations ====================

    async fn get_test_execution(
        &self,
        key: &TestExecutionKey,
    ) -> Result<Option<TestExecutionRow>, DataError>;

    /// Create the record without a result if it does not exist yet
    async fn create_test_execution(
        &self,
        key: &TestExecutionKey,
    ) -> Result<TestExecutionRow, DataError>;

    /// Attach a result to the record, creating it if absent.
    ///
    /// A record that already has a result keeps it; the returned row carries
    /// the result id that is actually stored.
    async fn record_test_result(
        &self,
        key: &TestExecutionKey,
        test_result_id: &str,
    ) -> Result<TestExecutionRow, DataError>;

    // ==================== Enrichment Operations ====================

    async fn upsert_trace_enrichment(&self, enrichment: &TraceEnrichment)
    -> Result<(), DataError>;

    async fn get_trace_enrichment(
        &self,
        project_id: &str,
        trace_id: &str,
    ) -> Result<Option<TraceEnrichment>, DataError>;
}
