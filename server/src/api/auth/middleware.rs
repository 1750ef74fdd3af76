//! HTTP API key middleware

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use super::api_key::{ApiKeyVerifier, AuthError};
use crate::core::constants::API_KEY_HEADER;

/// Require a valid `x-api-key` header on every request of the wrapped router
pub async fn require_api_key(
    State(verifier): State<ApiKeyVerifier>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .map(|v| v.as_bytes());

    if let Err(e) = verifier.verify(presented) {
        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_else(|| "-".to_string());
        tracing::warn!(
            reason = %e,
            user_agent,
            peer = %peer,
            path = %request.uri().path(),
            "Rejected HTTP request"
        );
        return Err(e);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::post;
    use tower::ServiceExt;

    fn app(secret: Option<&str>) -> Router {
        Router::new()
            .route("/", post(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(
                ApiKeyVerifier::new(secret),
                require_api_key,
            ))
    }

    fn request(key: Option<&str>) -> Request {
        let mut builder = Request::builder().method("POST").uri("/");
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_valid_key_reaches_handler() {
        let response = app(Some("k")).oneshot(request(Some("k"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bad_or_missing_key_is_401() {
        for key in [None, Some("nope")] {
            let response = app(Some("k")).oneshot(request(key)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn test_unconfigured_secret_is_401() {
        let response = app(None).oneshot(request(Some("k"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
