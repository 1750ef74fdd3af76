//! gRPC API key interceptor

use tonic::service::Interceptor;
use tonic::{Request, Status};

use super::api_key::ApiKeyVerifier;
use crate::core::constants::API_KEY_HEADER;

/// Rejects requests before they reach the service when the key does not match
#[derive(Clone, Debug)]
pub struct ApiKeyInterceptor {
    verifier: ApiKeyVerifier,
}

impl ApiKeyInterceptor {
    pub fn new(verifier: ApiKeyVerifier) -> Self {
        Self { verifier }
    }
}

impl Interceptor for ApiKeyInterceptor {
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        let presented = request
            .metadata()
            .get(API_KEY_HEADER)
            .map(|v| v.as_bytes());

        if let Err(e) = self.verifier.verify(presented) {
            let user_agent = request
                .metadata()
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            let peer = request
                .remote_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string());
            tracing::warn!(reason = %e, user_agent, peer = %peer, "Rejected gRPC export");
            return Err(Status::unauthenticated("Invalid or missing API key"));
        }

        Ok(request)
    }
}
