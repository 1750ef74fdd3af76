//! gRPC OTLP server

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTraceServiceRequest, ExportTraceServiceResponse,
    trace_service_server::{TraceService, TraceServiceServer},
};
use tokio::sync::watch;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::Server as TonicServer;
use tonic::{Request, Response, Status};

use super::{export_response_for, project_override};
use crate::api::auth::{ApiKeyInterceptor, ApiKeyVerifier};
use crate::core::config::OtelConfig;
use crate::core::constants::{OTLP_BODY_LIMIT, PROJECT_ID_HEADER};
use crate::domain::traces::{IngestError, TraceIngestGateway};

pub struct OtlpGrpcServer {
    addr: SocketAddr,
    gateway: Arc<TraceIngestGateway>,
    verifier: ApiKeyVerifier,
}

impl OtlpGrpcServer {
    pub fn new(
        config: &OtelConfig,
        host: &str,
        gateway: Arc<TraceIngestGateway>,
        verifier: ApiKeyVerifier,
    ) -> Result<Self> {
        let addr = SocketAddr::new(host.parse()?, config.grpc_port);
        Ok(Self {
            addr,
            gateway,
            verifier,
        })
    }

    pub async fn start(self, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        let addr = self.addr;

        tracing::debug!(%addr, "Starting OTLP gRPC server");

        let service = TraceServiceServer::new(OtlpTraceService::new(self.gateway))
            .max_decoding_message_size(OTLP_BODY_LIMIT)
            .max_encoding_message_size(OTLP_BODY_LIMIT);

        TonicServer::builder()
            .add_service(InterceptedService::new(
                service,
                ApiKeyInterceptor::new(self.verifier),
            ))
            .serve_with_shutdown(addr, async move {
                let _ = shutdown_rx.wait_for(|&v| v).await;
                tracing::debug!("OTLP gRPC server shutting down");
            })
            .await?;

        Ok(())
    }
}

/// gRPC trace service. Authentication is done by the interceptor in front of it.
pub struct OtlpTraceService {
    gateway: Arc<TraceIngestGateway>,
}

impl OtlpTraceService {
    pub fn new(gateway: Arc<TraceIngestGateway>) -> Self {
        Self { gateway }
    }
}

#[tonic::async_trait]
impl TraceService for OtlpTraceService {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> Result<Response<ExportTraceServiceResponse>, Status> {
        let project_id = project_override(
            request
                .metadata()
                .get(PROJECT_ID_HEADER)
                .and_then(|v| v.to_str().ok()),
        )
        .map(str::to_owned);
        let req = request.into_inner();

        match self.gateway.export(&req, project_id.as_deref()).await {
            Ok(report) => Ok(Response::new(export_response_for(&report))),
            Err(IngestError::InvalidProjectId(_)) => {
                Err(Status::invalid_argument("Invalid project_id"))
            }
            Err(IngestError::Persistence(_)) => Err(Status::internal("Failed to store spans")),
        }
    }
}
