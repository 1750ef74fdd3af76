//! API server and routes

pub mod auth;
pub mod middleware;
pub mod routes;
mod server;
pub mod types;

pub use routes::otlp_collector::{OtlpGrpcServer, OtlpTraceService};
pub use server::ApiServer;
