//! API server initialization

use std::net::SocketAddr;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use super::auth::require_api_key;
use super::middleware::{self, AllowedOrigins};
use super::routes::test_results::HookState;
use super::routes::{health, otlp_collector, test_results, traces};
use crate::core::CoreApp;
use crate::core::constants::{DEFAULT_BODY_LIMIT, OTLP_BODY_LIMIT};

pub struct ApiServer {
    app: CoreApp,
    allowed_origins: AllowedOrigins,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        let allowed_origins = AllowedOrigins::new(&app.config.server.host, app.config.server.port);
        Self {
            app,
            allowed_origins,
        }
    }

    /// Returns CoreApp for graceful shutdown
    pub async fn start(self) -> Result<CoreApp> {
        let Self {
            app,
            allowed_origins,
        } = self;

        let shutdown = app.shutdown.clone();
        let addr = SocketAddr::new(app.config.server.host.parse()?, app.config.server.port);

        let router = build_router(&app, &allowed_origins);

        let listener = TcpListener::bind(addr).await?;
        tracing::debug!(%addr, "Starting HTTP server");
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.wait())
        .await?;

        Ok(app)
    }
}

fn build_router(app: &CoreApp, allowed_origins: &AllowedOrigins) -> Router {
    let api_key = from_fn_with_state(app.verifier.clone(), require_api_key);

    let hook_routes = test_results::routes(HookState {
        repo: app.repo.clone(),
        linker: app.linker.clone(),
    })
    .layer(api_key.clone());

    let mut router = Router::new()
        .route("/api/v1/health", get(health::health))
        .nest("/api/v1", traces::routes(app.repo.clone()).merge(hook_routes));

    if app.config.otel.http_enabled {
        let otlp_routes = otlp_collector::routes(app.gateway.clone())
            .layer(DefaultBodyLimit::max(OTLP_BODY_LIMIT))
            .layer(api_key);
        router = router.nest("/v1", otlp_routes);
    }

    let router = router
        .fallback(middleware::handle_404)
        .layer(CompressionLayer::new())
        .layer(middleware::cors(allowed_origins))
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT));

    if app.config.debug {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}
