//! OTLP → Span normalization
//!
//! Flattens resource → scope → span nesting into `Span` records. Spans that
//! break a record invariant are dropped and reported, never coerced.

use chrono::{DateTime, Utc};
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::trace::v1::Span as OtlpSpan;
use serde_json::{Map, Value as JsonValue};

use super::validate::{SpanValidationError, validate_span};
use crate::core::constants::{DEFAULT_ENVIRONMENT, DEFAULT_PROJECT_ID};
use crate::data::types::{Span, SpanEvent, SpanKind, SpanLink, StatusCode};
use crate::utils::ids::canonical_uuid;
use crate::utils::otlp::{attributes_to_map, get_environment, keys, string_attr};
use crate::utils::time::nanos_to_datetime;

/// A span rejected during normalization
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedSpan {
    pub trace_id: String,
    pub span_id: String,
    pub reason: SpanValidationError,
}

#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub spans: Vec<Span>,
    pub dropped: Vec<DroppedSpan>,
}

/// Per-resource context shared by every span underneath it
struct ResourceContext {
    project_id: String,
    environment: String,
    attributes: Map<String, JsonValue>,
}

impl ResourceContext {
    fn new(attributes: Map<String, JsonValue>, project_override: Option<&str>) -> Self {
        let project_id = project_override
            .map(str::to_string)
            .or_else(|| string_attr(&attributes, keys::PROJECT_ID))
            .unwrap_or_else(|| DEFAULT_PROJECT_ID.to_string());
        let environment =
            get_environment(&attributes).unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
        Self {
            project_id,
            environment,
            attributes,
        }
    }
}

/// Flatten and validate an export request.
///
/// `project_override` (from the request header) wins over the
/// `spanlink.project_id` resource attribute.
pub fn normalize_request(
    request: &ExportTraceServiceRequest,
    project_override: Option<&str>,
) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    for resource_spans in &request.resource_spans {
        let resource_attrs = resource_spans
            .resource
            .as_ref()
            .map(|r| attributes_to_map(&r.attributes))
            .unwrap_or_default();
        let ctx = ResourceContext::new(resource_attrs, project_override);

        for scope_spans in &resource_spans.scope_spans {
            for otlp_span in &scope_spans.spans {
                match normalize_span(otlp_span, &ctx) {
                    Ok(span) => batch.spans.push(span),
                    Err(reason) => {
                        let dropped = DroppedSpan {
                            trace_id: hex::encode(&otlp_span.trace_id),
                            span_id: hex::encode(&otlp_span.span_id),
                            reason,
                        };
                        tracing::debug!(
                            trace_id = %dropped.trace_id,
                            span_id = %dropped.span_id,
                            span_name = %otlp_span.name,
                            reason = %dropped.reason,
                            "Dropping invalid span"
                        );
                        batch.dropped.push(dropped);
                    }
                }
            }
        }
    }

    batch
}

fn normalize_span(otlp: &OtlpSpan, ctx: &ResourceContext) -> Result<Span, SpanValidationError> {
    if otlp.start_time_unix_nano == 0 {
        return Err(SpanValidationError::MissingStartTime);
    }

    let mut attributes = attributes_to_map(&otlp.attributes);
    // Test context set on the resource applies to every span that lacks it
    for key in keys::TEST_CONTEXT {
        if !attributes.contains_key(key)
            && let Some(value) = ctx.attributes.get(key)
        {
            attributes.insert(key.to_string(), value.clone());
        }
    }

    let status_code = otlp
        .status
        .as_ref()
        .map(|s| StatusCode::from_otlp(s.code))
        .unwrap_or_default();
    let status_message = match (status_code, otlp.status.as_ref()) {
        (StatusCode::Error, Some(s)) if !s.message.trim().is_empty() => Some(s.message.clone()),
        _ => None,
    };

    let mut events: Vec<SpanEvent> = otlp
        .events
        .iter()
        .map(|e| SpanEvent {
            name: e.name.clone(),
            timestamp: nanos_to_datetime(e.time_unix_nano),
            attributes: attributes_to_map(&e.attributes),
        })
        .collect();
    events.sort_by_key(|e| e.timestamp);

    let links = otlp
        .links
        .iter()
        .map(|l| SpanLink {
            trace_id: hex::encode(&l.trace_id),
            span_id: hex::encode(&l.span_id),
            attributes: attributes_to_map(&l.attributes),
        })
        .collect();

    let span = Span {
        trace_id: hex::encode(&otlp.trace_id),
        span_id: hex::encode(&otlp.span_id),
        parent_span_id: if otlp.parent_span_id.is_empty() {
            None
        } else {
            Some(hex::encode(&otlp.parent_span_id))
        },
        project_id: ctx.project_id.clone(),
        environment: ctx.environment.clone(),
        span_name: otlp.name.clone(),
        span_kind: SpanKind::from_otlp(otlp.kind),
        start_time: nanos_to_datetime(otlp.start_time_unix_nano),
        end_time: end_time(otlp),
        status_code,
        status_message,
        test_run_id: correlation_id(&attributes, keys::TEST_RUN_ID),
        test_id: correlation_id(&attributes, keys::TEST_ID),
        test_configuration_id: correlation_id(&attributes, keys::TEST_CONFIGURATION_ID),
        test_result_id: correlation_id(&attributes, keys::TEST_RESULT_ID),
        attributes,
        events,
        links,
    };

    validate_span(&span)?;
    Ok(span)
}

/// An unset end (0) sorts before any real start and is rejected by validation
fn end_time(otlp: &OtlpSpan) -> DateTime<Utc> {
    if otlp.end_time_unix_nano == 0 {
        DateTime::UNIX_EPOCH
    } else {
        nanos_to_datetime(otlp.end_time_unix_nano)
    }
}

/// Correlation ids are stored canonically when UUID-shaped, verbatim otherwise
/// so the linker can report them as malformed.
fn correlation_id(attrs: &Map<String, JsonValue>, key: &str) -> Option<String> {
    string_attr(attrs, key).map(|raw| canonical_uuid(&raw).unwrap_or(raw))
}
