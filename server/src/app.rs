//! Core application

use std::sync::Arc;

use anyhow::Result;

use crate::api::auth::ApiKeyVerifier;
use crate::api::{ApiServer, OtlpGrpcServer};
use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{DEFAULT_LOG_FILTER, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::core::storage::AppStorage;
use crate::data::{SqliteService, TraceRepository};
use crate::domain::enrichment::{
    EnrichmentOrchestrator, LocalWorkerPool, SpanSummaryEnricher, TraceEnricher, WorkerPool,
};
use crate::domain::linking::{TraceResultLinker, start_unlinked_audit_task};
use crate::domain::traces::TraceIngestGateway;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub storage: AppStorage,
    pub database: Arc<SqliteService>,
    pub repo: Arc<dyn TraceRepository>,
    pub verifier: ApiKeyVerifier,
    pub linker: Arc<TraceResultLinker>,
    pub orchestrator: Arc<EnrichmentOrchestrator>,
    pub gateway: Arc<TraceIngestGateway>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        match command {
            Some(Commands::Config) => {
                let config = AppConfig::load(&cli_config)?;
                println!("{config:#?}");
                return Ok(());
            }
            Some(Commands::Start) | None => {}
        }

        let app = Self::init(&cli_config).await?;
        Self::start_server(app).await
    }

    /// Build every service. Enrichment workers are spawned here so their
    /// handles can be drained by the shutdown service.
    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let storage = AppStorage::init().await?;

        let database = Arc::new(SqliteService::init(&storage).await?);
        let repo: Arc<dyn TraceRepository> = database.clone();
        let shutdown = ShutdownService::new(database.clone());

        let verifier = ApiKeyVerifier::new(config.auth.api_key.as_deref());
        let enricher: Arc<dyn TraceEnricher> = Arc::new(SpanSummaryEnricher::new(repo.clone()));

        let (pool, worker_handles) = LocalWorkerPool::spawn(
            config.enrichment.workers,
            config.enrichment.queue_capacity,
            enricher.clone(),
            shutdown.subscribe(),
        );
        for handle in worker_handles {
            shutdown.register(handle).await;
        }
        let workers: Arc<dyn WorkerPool> = Arc::new(pool);
        let orchestrator = Arc::new(EnrichmentOrchestrator::new(
            workers,
            enricher,
            config.enrichment.probe_timeout(),
        ));

        let linker = Arc::new(TraceResultLinker::new(repo.clone()));
        let gateway = Arc::new(TraceIngestGateway::new(
            repo.clone(),
            linker.clone(),
            orchestrator.clone(),
        ));

        tracing::debug!(
            data_dir = %storage.data_dir().display(),
            workers = config.enrichment.workers,
            "Services initialized"
        );

        Ok(Self {
            shutdown,
            config,
            storage,
            database,
            repo,
            verifier,
            linker,
            orchestrator,
            gateway,
        })
    }

    fn init_logging() {
        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        app.start_background_tasks().await;

        let availability = app.orchestrator.probe().await;
        tracing::debug!(?availability, "Initial enrichment worker probe");

        if app.config.otel.grpc_enabled {
            let grpc_server = OtlpGrpcServer::new(
                &app.config.otel,
                &app.config.server.host,
                app.gateway.clone(),
                app.verifier.clone(),
            )?;
            let shutdown_rx = app.shutdown.subscribe();
            let handle = tokio::spawn(async move {
                if let Err(e) = grpc_server.start(shutdown_rx).await {
                    tracing::error!(error = %e, "OTLP gRPC server error");
                }
            });

            app.shutdown.register(handle).await;
        }

        tracing::info!(
            host = %app.config.server.host,
            port = app.config.server.port,
            grpc = app.config.otel.grpc_enabled,
            grpc_port = app.config.otel.grpc_port,
            http = app.config.otel.http_enabled,
            auth = app.verifier.is_configured(),
            "Spanlink listening"
        );

        let server = ApiServer::new(app);
        let app = server.start().await?;
        app.shutdown.shutdown().await;

        Ok(())
    }

    pub async fn start_background_tasks(&self) {
        self.shutdown
            .register(
                self.database
                    .start_checkpoint_task(self.shutdown.subscribe()),
            )
            .await;

        self.shutdown
            .register(start_unlinked_audit_task(
                self.repo.clone(),
                self.config.linking.audit_interval(),
                self.config.linking.staleness(),
                self.shutdown.subscribe(),
            ))
            .await;

        tracing::debug!("Background tasks started");
    }
}
