//! HTTP API running one independent analysis per uploaded CSV.
//!
//! - `GET /health`: liveness probe
//! - `POST /analyze`: CSV body in, JSON summary report out

mod handlers;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};

use crate::config::RunConfig;

pub use types::{AnalyzeQuery, ErrorResponse, HealthResponse};

/// Upload limit for `POST /analyze` (1 GiB); multi-million-reading datasets
/// run to a few hundred megabytes.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1 << 30;

/// Shared, read-only state. Each request copies the base configuration and
/// builds its own pipeline, so nothing mutable is shared between requests.
pub struct AppState {
    /// Base configuration; query parameters override it per request.
    pub config: RunConfig,
    /// Largest accepted CSV upload in bytes.
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);
    Router::new()
        .route("/health", get(handlers::health))
        .route("/analyze", post(handlers::analyze))
        .layer(body_limit)
        .with_state(state)
}

/// Binds to `addr` and serves the API until the server stops.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, router(state)).await
}
