//! API server initialization

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;

use super::middleware::{self, AllowedOrigins};
use super::routes::otlp_collector::OtlpState;
use super::routes::{health, otlp_collector, query};
use crate::core::CoreApp;
use crate::core::constants::{DEFAULT_BODY_LIMIT, OTLP_BODY_LIMIT};
use crate::domain::search::SearchService;

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

    /// Serve until shutdown is triggered; returns the app for teardown
    pub async fn start(self) -> Result<CoreApp> {
        let addr = SocketAddr::new(
            self.app.config.server.host.parse()?,
            self.app.config.server.port,
        );
        let router = build_router(
            self.app.otlp.clone(),
            self.app.search.clone(),
            &self.allowed_origins,
        );
        let shutdown = self.app.shutdown.clone();

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "HTTP server listening");
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        Ok(self.app)
    }
}

/// Full HTTP surface: health, OTLP/HTTP under `/v1`, queries under `/api/v1`
pub fn build_router(
    otlp: OtlpState,
    search: Arc<SearchService>,
    allowed_origins: &AllowedOrigins,
) -> Router {
    let otlp_routes = otlp_collector::routes(otlp)
        .layer(RequestDecompressionLayer::new())
        .layer(DefaultBodyLimit::max(OTLP_BODY_LIMIT));

    Router::new()
        .route("/api/v1/health", get(health::health))
        .nest("/v1", otlp_routes)
        .nest("/api/v1", query::routes(search))
        .fallback(middleware::handle_404)
        .layer(CompressionLayer::new())
        .layer(middleware::cors(allowed_origins))
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
}
