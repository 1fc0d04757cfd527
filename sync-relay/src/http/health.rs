//! Health check endpoint.

use crate::server::IngestRelay;
use crate::storage::ExpenseStorage;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Global start time for uptime calculation.
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call once at startup).
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

/// Health status response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Overall status: `ok`, or `degraded` when storage is unreadable.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Number of stored expenses.
    pub expenses: u64,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Health check handler.
pub async fn health_handler(Extension(relay): Extension<Arc<IngestRelay>>) -> Json<HealthStatus> {
    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);

    let (status, expenses) = match relay.storage().count_expenses().await {
        Ok(count) => ("ok", count),
        Err(e) => {
            tracing::warn!("Health check could not read storage: {}", e);
            ("degraded", 0)
        }
    };

    Json(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        expenses,
        uptime_seconds: uptime,
    })
}
