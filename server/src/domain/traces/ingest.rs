//! Ingestion gateway: OTLP export request → persisted spans
//!
//! Authentication happens at the transport edge before `export` is called.
//! From there the flow is:
//!
//! 1. Normalize and validate (invalid spans dropped, never coerced)
//! 2. Persist the surviving spans in one transaction
//! 3. Link spans to test results that already exist
//! 4. Dispatch enrichment for every touched trace
//!
//! Only steps 1 (project id) and 2 can fail the call. Linking and enrichment
//! complete on their own and never turn an accepted batch into an error.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use thiserror::Error;

use super::normalize::normalize_request;
use crate::data::types::Span;
use crate::data::{DataError, TraceRepository};
use crate::domain::enrichment::{DispatchCounts, EnrichmentOrchestrator};
use crate::domain::linking::{TEST_CONFIGURATION_ID_ATTR, TraceResultLinker};
use crate::utils::ids::is_valid_project_id;
use crate::utils::otlp::string_attr;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid project id: {0}")]
    InvalidProjectId(String),

    #[error("Failed to persist spans")]
    Persistence(#[source] DataError),
}

/// What happened to one export request
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Spans that passed validation
    pub accepted: usize,
    /// Spans newly written (duplicates excluded)
    pub persisted: u64,
    /// Spans rejected by validation
    pub dropped: usize,
    pub trace_ids: BTreeSet<String>,
    /// Spans linked to an existing test result by this request
    pub linked: u64,
    pub enrichment: DispatchCounts,
}

pub struct TraceIngestGateway {
    repo: Arc<dyn TraceRepository>,
    linker: Arc<TraceResultLinker>,
    enrichment: Arc<EnrichmentOrchestrator>,
}

impl TraceIngestGateway {
    pub fn new(
        repo: Arc<dyn TraceRepository>,
        linker: Arc<TraceResultLinker>,
        enrichment: Arc<EnrichmentOrchestrator>,
    ) -> Self {
        Self {
            repo,
            linker,
            enrichment,
        }
    }

    pub async fn export(
        &self,
        request: &ExportTraceServiceRequest,
        project_override: Option<&str>,
    ) -> Result<IngestReport, IngestError> {
        if let Some(project_id) = project_override
            && !is_valid_project_id(project_id)
        {
            return Err(IngestError::InvalidProjectId(project_id.to_string()));
        }

        let batch = normalize_request(request, project_override);
        let mut report = IngestReport {
            accepted: batch.spans.len(),
            dropped: batch.dropped.len(),
            ..Default::default()
        };

        if !batch.dropped.is_empty() {
            tracing::warn!(
                dropped = batch.dropped.len(),
                accepted = batch.spans.len(),
                "Dropped invalid spans from export batch"
            );
        }
        if batch.spans.is_empty() {
            return Ok(report);
        }

        report.persisted = self.repo.insert_spans(&batch.spans).await.map_err(|e| {
            tracing::error!(error = %e, spans = batch.spans.len(), "Failed to persist span batch");
            IngestError::Persistence(e)
        })?;

        for group in group_by_test_context(&batch.spans) {
            report.linked += self.linker.link_for_incoming_spans(&group).await.count();
        }

        let touched: BTreeSet<(String, String)> = batch
            .spans
            .iter()
            .map(|s| (s.project_id.clone(), s.trace_id.clone()))
            .collect();
        report.enrichment = self.enrichment.enrich_batch(&touched).await;
        report.trace_ids = touched.into_iter().map(|(_, trace_id)| trace_id).collect();

        tracing::debug!(
            accepted = report.accepted,
            persisted = report.persisted,
            traces = report.trace_ids.len(),
            linked = report.linked,
            "Ingested span batch"
        );
        Ok(report)
    }
}

/// Split test-context spans by their correlation triple. The linker decides
/// on the first span of a slice, so each slice must share one context.
fn group_by_test_context(spans: &[Span]) -> Vec<Vec<Span>> {
    let mut groups: BTreeMap<(String, String, Option<String>), Vec<Span>> = BTreeMap::new();
    for span in spans {
        let (Some(run), Some(test)) = (&span.test_run_id, &span.test_id) else {
            continue;
        };
        let config = string_attr(&span.attributes, TEST_CONFIGURATION_ID_ATTR);
        groups
            .entry((run.clone(), test.clone(), config))
            .or_default()
            .push(span.clone());
    }
    groups.into_values().collect()
}
