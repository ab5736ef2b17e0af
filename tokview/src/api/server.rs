//! API server for tokview

use anyhow::Result;
use axum::{middleware::from_fn, routing::get, Router};
use std::sync::Arc;
use tokview_cache::CacheService;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;

use super::compression::gzip_response;
use super::routes::{cache_stats, cache_status, health_check, AppState};

/// API server
pub struct ApiServer {
    config: ServerConfig,
}

impl ApiServer {
    /// Create a new API server with configuration
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Create a new API server with default configuration
    pub fn with_defaults() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Build the router over an existing cache service
    pub fn router(cache: Arc<CacheService>) -> Router {
        let app_state = Arc::new(AppState { cache });

        Router::new()
            .route("/health", get(health_check))
            .route("/cache/status", get(cache_status))
            .route("/cache/stats", get(cache_stats))
            .with_state(app_state)
            .layer(from_fn(gzip_response))
            .layer(TraceLayer::new_for_http())
    }

    /// Start the API server
    pub async fn start(self) -> Result<()> {
        let cache = Arc::new(CacheService::from_config(self.config.cache.clone())?);
        let app = Self::router(cache);

        let addr = self.config.bind_addr();
        info!("Starting API server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
