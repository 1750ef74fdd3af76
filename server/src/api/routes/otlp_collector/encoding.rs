//! OTLP/HTTP body encoding
//!
//! The request `Content-Type` picks the codec (`application/json` or
//! protobuf, the default) and the response is encoded the same way.

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use prost::Message;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtlpContentType {
    Protobuf,
    Json,
}

impl OtlpContentType {
    /// Anything that is not JSON is treated as protobuf
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if content_type.starts_with("application/json") {
            Self::Json
        } else {
            Self::Protobuf
        }
    }

    pub fn as_header_value(self) -> &'static str {
        match self {
            Self::Protobuf => "application/x-protobuf",
            Self::Json => "application/json",
        }
    }
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("protobuf decode error: {0}")]
    Protobuf(#[from] prost::DecodeError),

    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn decode_traces(
    body: &Bytes,
    content_type: OtlpContentType,
) -> Result<ExportTraceServiceRequest, DecodeError> {
    Ok(match content_type {
        OtlpContentType::Protobuf => ExportTraceServiceRequest::decode(body.as_ref())?,
        OtlpContentType::Json => serde_json::from_slice(body.as_ref())?,
    })
}

/// Encode the export response in the request's encoding
pub fn export_response(response: &ExportTraceServiceResponse, content_type: OtlpContentType) -> Response {
    let bytes = match content_type {
        OtlpContentType::Protobuf => Ok(response.encode_to_vec()),
        OtlpContentType::Json => serde_json::to_vec(response),
    };
    match bytes {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type.as_header_value())],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode OTLP response");
            plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// Plain-text error body. Details stay in the logs.
pub fn plain(status: StatusCode, message: &'static str) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain")], message).into_response()
}
