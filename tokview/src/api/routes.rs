//! API routes for tokview operators

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use tokview_cache::CacheService;

/// Application state
pub struct AppState {
    pub cache: Arc<CacheService>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Runs the cache self-test; 503 when the store is not usable
pub async fn cache_status(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = app_state.cache.test_cache_connection().await;
    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(report))
}

/// Cache service counters
pub async fn cache_stats(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(app_state.cache.stats().await)
}
