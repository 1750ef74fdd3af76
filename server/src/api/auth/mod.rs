//! Ingestion authentication
//!
//! One shared secret, read from the environment, guards every write surface.
//! The same `ApiKeyVerifier` backs the gRPC interceptor and the HTTP
//! middleware, so both transports accept and reject exactly the same keys.

mod api_key;
mod interceptor;
mod middleware;

pub use api_key::{ApiKeyVerifier, AuthError};
pub use interceptor::ApiKeyInterceptor;
pub use middleware::require_api_key;
