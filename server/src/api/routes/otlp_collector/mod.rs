//! OpenTelemetry Protocol (OTLP) trace endpoints, HTTP and gRPC
//!
//! Both transports decode into the same `ExportTraceServiceRequest` and hand
//! it to the shared `TraceIngestGateway`.

mod encoding;
mod grpc;
mod traces;

pub use grpc::{OtlpGrpcServer, OtlpTraceService};

use std::sync::Arc;

use axum::Router;
use axum::routing::post;
use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTracePartialSuccess, ExportTraceServiceResponse,
};

use crate::domain::traces::{IngestReport, TraceIngestGateway};

pub fn routes(gateway: Arc<TraceIngestGateway>) -> Router {
    Router::new()
        .route("/traces", post(traces::export))
        .with_state(gateway)
}

/// Empty header values mean "no override", same as an absent header
fn project_override(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// OTLP response for an accepted batch. Dropped spans are reported as a
/// partial success so exporters can surface them without retrying.
fn export_response_for(report: &IngestReport) -> ExportTraceServiceResponse {
    let partial_success = (report.dropped > 0).then(|| ExportTracePartialSuccess {
        rejected_spans: report.dropped as i64,
        error_message: format!("{} invalid span(s) dropped", report.dropped),
    });
    ExportTraceServiceResponse { partial_success }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_override() {
        assert_eq!(project_override(None), None);
        assert_eq!(project_override(Some("")), None);
        assert_eq!(project_override(Some("  ")), None);
        assert_eq!(project_override(Some("proj-1")), Some("proj-1"));
    }

    #[test]
    fn test_export_response_reports_dropped_spans() {
        let clean = export_response_for(&IngestReport::default());
        assert!(clean.partial_success.is_none());

        let report = IngestReport {
            accepted: 3,
            dropped: 2,
            ..Default::default()
        };
        let partial = export_response_for(&report).partial_success.unwrap();
        assert_eq!(partial.rejected_spans, 2);
        assert!(partial.error_message.contains('2'));
    }
}
