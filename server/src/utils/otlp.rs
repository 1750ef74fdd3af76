//! OTLP utility functions
//!
//! Conversion of OTLP protobuf attribute values into JSON and the attribute
//! keys spanlink reads from resources and spans.

use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value};
use serde_json::{Map, Value as JsonValue};

// ============================================================================
// ATTRIBUTE KEYS
// ============================================================================

pub mod keys {
    pub const PROJECT_ID: &str = "spanlink.project_id";
    pub const DEPLOYMENT_ENV: &str = "deployment.environment";
    pub const DEPLOYMENT_ENV_NAME: &str = "deployment.environment.name";

    pub const TEST_RUN_ID: &str = "spanlink.test_run_id";
    pub const TEST_ID: &str = "spanlink.test_id";
    /// Travels inside the span attribute map rather than as a typed field.
    pub const TEST_CONFIGURATION_ID: &str = "spanlink.test_configuration_id";
    pub const TEST_RESULT_ID: &str = "spanlink.test_result_id";

    /// Test context keys copied from resource to span attributes when the span lacks them
    pub const TEST_CONTEXT: [&str; 4] = [
        TEST_RUN_ID,
        TEST_ID,
        TEST_CONFIGURATION_ID,
        TEST_RESULT_ID,
    ];
}

// ============================================================================
// JSON-PRESERVING ATTRIBUTE EXTRACTION
// ============================================================================

/// Convert AnyValue to JSON value (preserves native types)
pub fn any_value_to_json(value: &AnyValue) -> JsonValue {
    match &value.value {
        Some(any_value::Value::StringValue(s)) => serde_json::json!(s),
        Some(any_value::Value::BoolValue(b)) => serde_json::json!(b),
        Some(any_value::Value::IntValue(i)) => serde_json::json!(i),
        Some(any_value::Value::DoubleValue(d)) => serde_json::json!(d),
        Some(any_value::Value::ArrayValue(arr)) => {
            serde_json::json!(arr.values.iter().map(any_value_to_json).collect::<Vec<_>>())
        }
        Some(any_value::Value::KvlistValue(kvlist)) => {
            JsonValue::Object(attributes_to_map(&kvlist.values))
        }
        Some(any_value::Value::BytesValue(b)) => serde_json::json!(hex::encode(b)),
        None => JsonValue::Null,
    }
}

/// Build a JSON map from raw KeyValue attributes (preserves types, last key wins)
pub fn attributes_to_map(attrs: &[KeyValue]) -> Map<String, JsonValue> {
    attrs
        .iter()
        .filter_map(|kv| {
            kv.value
                .as_ref()
                .map(|v| (kv.key.clone(), any_value_to_json(v)))
        })
        .collect()
}

/// Read an attribute as a non-empty string. Numbers are rendered, everything else is ignored.
pub fn string_attr(attrs: &Map<String, JsonValue>, key: &str) -> Option<String> {
    match attrs.get(key)? {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Extract deployment environment (tries deployment.environment then .name)
pub fn get_environment(attrs: &Map<String, JsonValue>) -> Option<String> {
    string_attr(attrs, keys::DEPLOYMENT_ENV)
        .or_else(|| string_attr(attrs, keys::DEPLOYMENT_ENV_NAME))
}
