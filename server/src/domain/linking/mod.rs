//! Trace ↔ test-result linking
//!
//! Spans and test-execution records arrive independently and in either
//! order. Each direction re-reads the other side's persisted state and
//! applies the same conditional update, so whichever event arrives second
//! completes the link on its own:
//!
//! - `link_for_result_created`: a result now exists, backfill spans already stored
//! - `link_for_incoming_spans`: spans were just stored, link them if the result exists
//!
//! A triple moves Unlinked → Linked once and stays there; repeating either
//! call is a no-op.

mod audit;

pub use audit::{audit_unlinked_spans, start_unlinked_audit_task};

use std::sync::Arc;

use crate::data::TraceRepository;
use crate::data::types::{Span, TestExecutionKey};
use crate::utils::ids::canonical_uuid;
use crate::utils::otlp::{keys, string_attr};

/// Attribute carrying the test configuration id inside a span's attribute map
pub const TEST_CONFIGURATION_ID_ATTR: &str = keys::TEST_CONFIGURATION_ID;

/// Result of a link attempt. Every state except `Linked` is expected and non-fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The update ran; carries the number of spans that gained a result id
    Linked(u64),
    /// The other side (record or result) has not arrived yet
    NotYet,
    /// Spans carry no test context
    NotTestTraffic,
    /// Test context present but the configuration attribute is missing
    MissingConfiguration,
    /// A correlation id is not UUID-shaped
    Invalid,
    /// Storage error, already logged
    Failed,
}

impl LinkOutcome {
    /// Spans linked by this attempt (zero for every non-`Linked` state)
    pub fn count(&self) -> u64 {
        match self {
            Self::Linked(n) => *n,
            _ => 0,
        }
    }
}

pub struct TraceResultLinker {
    repo: Arc<dyn TraceRepository>,
}

impl TraceResultLinker {
    pub fn new(repo: Arc<dyn TraceRepository>) -> Self {
        Self { repo }
    }

    /// Backfill `test_result_id` on stored spans once a result exists for the triple.
    ///
    /// Zero linked spans is normal: the spans may not have been ingested yet.
    pub async fn link_for_result_created(
        &self,
        test_run_id: &str,
        test_id: &str,
        test_configuration_id: &str,
        test_result_id: &str,
    ) -> LinkOutcome {
        let (Some(key), Some(result_id)) = (
            canonical_key(test_run_id, test_id, test_configuration_id),
            canonical_uuid(test_result_id),
        ) else {
            tracing::error!(
                test_run_id,
                test_id,
                test_configuration_id,
                test_result_id,
                "Malformed correlation id on result creation, skipping link"
            );
            return LinkOutcome::Invalid;
        };

        self.apply(&key, &result_id).await
    }

    /// Link a freshly persisted batch if its test execution already has a result.
    ///
    /// The first span decides: every span of one export batch shares the same
    /// test context.
    pub async fn link_for_incoming_spans(&self, spans: &[Span]) -> LinkOutcome {
        let Some(first) = spans.first() else {
            return LinkOutcome::NotTestTraffic;
        };
        let (Some(test_run_id), Some(test_id)) = (&first.test_run_id, &first.test_id) else {
            return LinkOutcome::NotTestTraffic;
        };

        let Some(test_configuration_id) = string_attr(&first.attributes, TEST_CONFIGURATION_ID_ATTR)
        else {
            tracing::warn!(
                trace_id = %first.trace_id,
                test_run_id = %test_run_id,
                test_id = %test_id,
                attribute = TEST_CONFIGURATION_ID_ATTR,
                "Test span without configuration attribute, skipping link"
            );
            return LinkOutcome::MissingConfiguration;
        };

        let Some(key) = canonical_key(test_run_id, test_id, &test_configuration_id) else {
            tracing::error!(
                trace_id = %first.trace_id,
                test_run_id = %test_run_id,
                test_id = %test_id,
                test_configuration_id = %test_configuration_id,
                "Malformed correlation id on ingested spans, skipping link"
            );
            return LinkOutcome::Invalid;
        };

        let record = match self.repo.get_test_execution(&key).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(error = %e, trace_id = %first.trace_id, "Test execution lookup failed");
                return LinkOutcome::Failed;
            }
        };

        match record.and_then(|r| r.test_result_id) {
            Some(result_id) => self.apply(&key, &result_id).await,
            None => {
                tracing::debug!(
                    trace_id = %first.trace_id,
                    test_run_id = %key.test_run_id,
                    test_id = %key.test_id,
                    "No test result yet, link deferred"
                );
                LinkOutcome::NotYet
            }
        }
    }

    async fn apply(&self, key: &TestExecutionKey, test_result_id: &str) -> LinkOutcome {
        match self.repo.link_test_result(key, test_result_id).await {
            Ok(count) => {
                tracing::debug!(
                    test_run_id = %key.test_run_id,
                    test_id = %key.test_id,
                    test_configuration_id = %key.test_configuration_id,
                    test_result_id,
                    count,
                    "Linked spans to test result"
                );
                LinkOutcome::Linked(count)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    test_run_id = %key.test_run_id,
                    test_id = %key.test_id,
                    "Failed to link spans to test result"
                );
                LinkOutcome::Failed
            }
        }
    }
}

/// Canonical triple, or `None` when any part is not a UUID
pub fn canonical_key(
    test_run_id: &str,
    test_id: &str,
    test_configuration_id: &str,
) -> Option<TestExecutionKey> {
    Some(TestExecutionKey::new(
        canonical_uuid(test_run_id)?,
        canonical_uuid(test_id)?,
        canonical_uuid(test_configuration_id)?,
    ))
}
