//! Shared-secret API key verification

use std::fmt;
use std::sync::Arc;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::utils::crypto::constant_time_eq;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No server secret configured; every request is rejected
    #[error("API key authentication is not configured")]
    NotConfigured,

    #[error("Missing API key")]
    Missing,

    #[error("Invalid API key")]
    Invalid,
}

impl AuthError {
    fn code(self) -> &'static str {
        match self {
            Self::NotConfigured => "AUTH_NOT_CONFIGURED",
            Self::Missing => "API_KEY_MISSING",
            Self::Invalid => "API_KEY_INVALID",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // Same message for every variant so callers learn nothing about the secret
        let body = json!({
            "error": "unauthorized",
            "code": self.code(),
            "message": "Invalid or missing API key",
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

/// Compares presented keys against the configured secret in constant time
#[derive(Clone)]
pub struct ApiKeyVerifier {
    secret: Option<Arc<str>>,
}

impl ApiKeyVerifier {
    /// An empty secret counts as unset
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()).map(Arc::from),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    pub fn verify(&self, presented: Option<&[u8]>) -> Result<(), AuthError> {
        let secret = self.secret.as_deref().ok_or(AuthError::NotConfigured)?;
        let presented = presented
            .filter(|p| !p.is_empty())
            .ok_or(AuthError::Missing)?;
        if constant_time_eq(presented, secret.as_bytes()) {
            Ok(())
        } else {
            Err(AuthError::Invalid)
        }
    }
}

impl fmt::Debug for ApiKeyVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyVerifier")
            .field("configured", &self.is_configured())
            .finish()
    }
}
