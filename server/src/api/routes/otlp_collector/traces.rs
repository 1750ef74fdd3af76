//! Traces export endpoint (POST /v1/traces)

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;

use super::encoding::{OtlpContentType, decode_traces, export_response, plain};
use super::{export_response_for, project_override};
use crate::core::constants::PROJECT_ID_HEADER;
use crate::domain::traces::{IngestError, TraceIngestGateway};

pub async fn export(
    State(gateway): State<Arc<TraceIngestGateway>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = OtlpContentType::from_headers(&headers);

    let request = match decode_traces(&body, content_type) {
        Ok(req) => req,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to decode OTLP/HTTP trace request");
            return plain(StatusCode::BAD_REQUEST, "Invalid OTLP payload");
        }
    };

    let project_id = project_override(
        headers
            .get(PROJECT_ID_HEADER)
            .and_then(|v| v.to_str().ok()),
    );

    match gateway.export(&request, project_id).await {
        Ok(report) => export_response(&export_response_for(&report), content_type),
        Err(IngestError::InvalidProjectId(_)) => {
            plain(StatusCode::BAD_REQUEST, "Invalid project_id")
        }
        Err(IngestError::Persistence(_)) => {
            plain(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store spans")
        }
    }
}
