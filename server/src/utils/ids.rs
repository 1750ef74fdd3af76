//! Identifier checks shared by ingestion, linking and the HTTP API

use uuid::Uuid;

/// Lowercase hex of an exact length, rejecting the all-zero id OTLP uses for "unset".
fn is_hex_id(id: &str, len: usize) -> bool {
    id.len() == len
        && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        && id.bytes().any(|b| b != b'0')
}

/// 32 lowercase hex characters, not all zero
pub fn is_valid_trace_id(id: &str) -> bool {
    is_hex_id(id, 32)
}

/// 16 lowercase hex characters, not all zero
pub fn is_valid_span_id(id: &str) -> bool {
    is_hex_id(id, 16)
}

/// Validate project ID format: alphanumeric, dash, underscore; 1..=64 chars
pub fn is_valid_project_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Parse a UUID-shaped correlation id and return its canonical hyphenated lowercase form.
///
/// Accepts any form `uuid` parses (hyphenated, simple, braced, urn) so the
/// same id written two ways by different producers still correlates.
pub fn canonical_uuid(raw: &str) -> Option<String> {
    Uuid::parse_str(raw.trim())
        .ok()
        .map(|u| u.hyphenated().to_string())
}
