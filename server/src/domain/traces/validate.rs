//! Span record invariants
//!
//! Span names must describe primitive operations: `ai.<domain>.<action>` or
//! `function.<name>`. Framework abstractions (agents, chains, workflows,
//! pipelines) are rejected as `ai.*` domains.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::data::types::Span;
use crate::utils::ids::{is_valid_project_id, is_valid_span_id, is_valid_trace_id};
use crate::utils::time::datetime_to_nanos;

/// `ai.*` domains that name orchestration layers rather than operations
const FORBIDDEN_AI_DOMAINS: [&str; 4] = ["agent", "chain", "workflow", "pipeline"];

fn ai_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^ai\.([a-z][a-z0-9_]*)\.([a-z][a-z0-9_]*)$").expect("valid regex")
    })
}

fn function_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^function\.[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
            .expect("valid regex")
    })
}

/// Why a span was dropped at ingestion
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpanValidationError {
    #[error("invalid trace_id '{0}'")]
    InvalidTraceId(String),

    #[error("invalid span_id '{0}'")]
    InvalidSpanId(String),

    #[error("invalid parent_span_id '{0}'")]
    InvalidParentSpanId(String),

    #[error("span name '{0}' is not ai.<domain>.<action> or function.<name>")]
    InvalidSpanName(String),

    #[error("invalid project id '{0}'")]
    InvalidProjectId(String),

    #[error("missing start time")]
    MissingStartTime,

    #[error("end time precedes start time")]
    EndBeforeStart,

    #[error("{0} is outside the storable time range")]
    TimestampOutOfRange(&'static str),
}

pub fn is_valid_span_name(name: &str) -> bool {
    if let Some(caps) = ai_name_regex().captures(name) {
        let domain = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        return !FORBIDDEN_AI_DOMAINS.contains(&domain);
    }
    function_name_regex().is_match(name)
}

/// Check a normalized span against the record invariants
pub fn validate_span(span: &Span) -> Result<(), SpanValidationError> {
    if !is_valid_trace_id(&span.trace_id) {
        return Err(SpanValidationError::InvalidTraceId(span.trace_id.clone()));
    }
    if !is_valid_span_id(&span.span_id) {
        return Err(SpanValidationError::InvalidSpanId(span.span_id.clone()));
    }
    if let Some(parent) = &span.parent_span_id
        && !is_valid_span_id(parent)
    {
        return Err(SpanValidationError::InvalidParentSpanId(parent.clone()));
    }
    if !is_valid_project_id(&span.project_id) {
        return Err(SpanValidationError::InvalidProjectId(span.project_id.clone()));
    }
    if !is_valid_span_name(&span.span_name) {
        return Err(SpanValidationError::InvalidSpanName(span.span_name.clone()));
    }
    if datetime_to_nanos(&span.start_time).is_none() {
        return Err(SpanValidationError::TimestampOutOfRange("start_time"));
    }
    if datetime_to_nanos(&span.end_time).is_none() {
        return Err(SpanValidationError::TimestampOutOfRange("end_time"));
    }
    if span.end_time < span.start_time {
        return Err(SpanValidationError::EndBeforeStart);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::{SpanKind, StatusCode};
    use chrono::{TimeZone, Utc};
    use serde_json::Map;

    fn valid_span() -> Span {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        Span {
            trace_id: "a".repeat(32),
            span_id: "b".repeat(16),
            parent_span_id: Some("c".repeat(16)),
            project_id: "default".into(),
            environment: "development".into(),
            span_name: "ai.llm.generate".into(),
            span_kind: SpanKind::Client,
            start_time: start,
            end_time: start,
            status_code: StatusCode::Ok,
            status_message: None,
            attributes: Map::new(),
            events: vec![],
            links: vec![],
            test_run_id: None,
            test_id: None,
            test_configuration_id: None,
            test_result_id: None,
        }
    }

    #[test]
    fn test_accepts_primitive_operation_names() {
        for name in [
            "ai.llm.generate",
            "ai.embedding.create",
            "ai.tool.call",
            "ai.retrieval.search_docs",
            "function.main",
            "function.app.handlers.process_order",
            "function._private",
        ] {
            assert!(is_valid_span_name(name), "{name} should be accepted");
        }
    }

    #[test]
    fn test_rejects_framework_abstractions() {
        for name in [
            "ai.agent.run",
            "ai.chain.invoke",
            "ai.workflow.step",
            "ai.pipeline.execute",
        ] {
            assert!(!is_valid_span_name(name), "{name} should be rejected");
        }
    }

    #[test]
    fn test_rejects_malformed_names() {
        for name in [
            "",
            "ai.llm",
            "ai.llm.generate.extra",
            "AI.llm.generate",
            "ai.LLM.generate",
            "function.",
            "function.1abc",
            "http.request",
            "GET /users",
        ] {
            assert!(!is_valid_span_name(name), "{name:?} should be rejected");
        }
    }

    #[test]
    fn test_validate_accepts_valid_span() {
        assert_eq!(validate_span(&valid_span()), Ok(()));
    }

    #[test]
    fn test_validate_reports_first_violation() {
        let mut span = valid_span();
        span.trace_id = "0".repeat(32);
        assert!(matches!(
            validate_span(&span),
            Err(SpanValidationError::InvalidTraceId(_))
        ));

        let mut span = valid_span();
        span.span_id = "xyz".into();
        assert!(matches!(
            validate_span(&span),
            Err(SpanValidationError::InvalidSpanId(_))
        ));

        let mut span = valid_span();
        span.parent_span_id = Some("short".into());
        assert!(matches!(
            validate_span(&span),
            Err(SpanValidationError::InvalidParentSpanId(_))
        ));

        let mut span = valid_span();
        span.span_name = "ai.agent.run".into();
        assert!(matches!(
            validate_span(&span),
            Err(SpanValidationError::InvalidSpanName(_))
        ));

        let mut span = valid_span();
        span.end_time = span.start_time - chrono::Duration::nanoseconds(1);
        assert_eq!(validate_span(&span), Err(SpanValidationError::EndBeforeStart));
    }

    #[test]
    fn test_rejects_timestamps_beyond_storage_range() {
        use crate::utils::time::nanos_to_datetime;

        let mut span = valid_span();
        span.end_time = nanos_to_datetime(u64::MAX);
        assert_eq!(
            validate_span(&span),
            Err(SpanValidationError::TimestampOutOfRange("end_time"))
        );

        let mut span = valid_span();
        span.start_time = nanos_to_datetime(i64::MAX as u64 + 1);
        span.end_time = span.start_time;
        assert_eq!(
            validate_span(&span),
            Err(SpanValidationError::TimestampOutOfRange("start_time"))
        );

        let mut span = valid_span();
        span.start_time = nanos_to_datetime(i64::MAX as u64);
        span.end_time = span.start_time;
        assert_eq!(validate_span(&span), Ok(()));
    }
}
