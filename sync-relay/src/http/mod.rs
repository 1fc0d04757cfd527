//! HTTP endpoints for sync-relay.
//!
//! Provides batch ingestion, health checks, and metrics.

mod batch;
pub mod health;
mod metrics;

use crate::server::IngestRelay;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use sync_types::BATCH_PATH;
use tokio::net::TcpListener;

pub use health::HealthStatus;

/// Build the HTTP router with all endpoints.
pub fn build_router(relay: Arc<IngestRelay>) -> Router {
    let mut router = Router::new()
        .route(BATCH_PATH, post(batch::batch_handler))
        .route("/health", get(health::health_handler));

    if relay.config().http.metrics_enabled {
        router = router.route("/metrics", get(metrics::metrics_handler));
    }

    router.layer(Extension(relay))
}

/// Serve the router on `listener` until the future is dropped or fails.
pub async fn serve(listener: TcpListener, relay: Arc<IngestRelay>) -> std::io::Result<()> {
    axum::serve(listener, build_router(relay)).await
}
