//! TraceRepository trait implementation for SQLite
//!
//! Thin delegation from the trait to the repository functions, converting
//! `SqliteError` into the unified `DataError`. Implemented on the service
//! itself so an `Arc<SqliteService>` coerces to `Arc<dyn TraceRepository>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::data::error::DataError;
use crate::data::traits::TraceRepository;
use crate::data::types::{Span, TestExecutionKey, TestExecutionRow, TraceEnrichment};

use super::SqliteService;
use super::repositories::{enrichment, span, test_execution};

#[async_trait]
impl TraceRepository for SqliteService {
    // ==================== Span Operations ====================

    async fn insert_spans(&self, spans: &[Span]) -> Result<u64, DataError> {
        span::insert_spans(self.pool(), spans)
            .await
            .map_err(Into::into)
    }

    async fn get_trace_spans(
        &self,
        project_id: &str,
        trace_id: &str,
    ) -> Result<Vec<Span>, DataError> {
        span::get_trace_spans(self.pool(), project_id, trace_id)
            .await
            .map_err(Into::into)
    }

    async fn link_test_result(
        &self,
        key: &TestExecutionKey,
        test_result_id: &str,
    ) -> Result<u64, DataError> {
        span::link_test_result(self.pool(), key, test_result_id)
            .await
            .map_err(Into::into)
    }

    async fn count_unlinked_spans(&self, older_than: DateTime<Utc>) -> Result<u64, DataError> {
        span::count_unlinked_spans(self.pool(), older_than)
            .await
            .map_err(Into::into)
    }

    // ==================== Test Execution Operations ====================

    async fn get_test_execution(
        &self,
        key: &TestExecutionKey,
    ) -> Result<Option<TestExecutionRow>, DataError> {
        test_execution::get_test_execution(self.pool(), key)
            .await
            .map_err(Into::into)
    }

    async fn create_test_execution(
        &self,
        key: &TestExecutionKey,
    ) -> Result<TestExecutionRow, DataError> {
        test_execution::create_test_execution(self.pool(), key)
            .await
            .map_err(Into::into)
    }

    async fn record_test_result(
        &self,
        key: &TestExecutionKey,
        test_result_id: &str,
    ) -> Result<TestExecutionRow, DataError> {
        test_execution::record_test_result(self.pool(), key, test_result_id)
            .await
            .map_err(Into::into)
    }

    // ==================== Enrichment Operations ====================

    async fn upsert_trace_enrichment(
        &self,
        summary: &TraceEnrichment,
    ) -> Result<(), DataError> {
        enrichment::upsert_trace_enrichment(self.pool(), summary)
            .await
            .map_err(Into::into)
    }

    async fn get_trace_enrichment(
        &self,
        project_id: &str,
        trace_id: &str,
    ) -> Result<Option<TraceEnrichment>, DataError> {
        enrichment::get_trace_enrichment(self.pool(), project_id, trace_id)
            .await
            .map_err(Into::into)
    }
}
