//! Prometheus metrics endpoint.

use crate::server::IngestRelay;
use crate::storage::ExpenseStorage;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Returns metrics in Prometheus text format: counters since startup plus
/// the stored expense count.
pub async fn metrics_handler(Extension(relay): Extension<Arc<IngestRelay>>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        render(&relay).await,
    )
}

async fn render(relay: &IngestRelay) -> String {
    let m = relay.metrics();

    // Counters, monotonic since startup
    let batches = m.batches_total.load(Ordering::Relaxed);
    let accepted = m.records_accepted.load(Ordering::Relaxed);
    let duplicates = m.records_duplicate.load(Ordering::Relaxed);
    let rejected = m.records_rejected.load(Ordering::Relaxed);
    let errors = m.errors_total.load(Ordering::Relaxed);

    // Storage stats (best effort)
    let stored = relay.storage().count_expenses().await.unwrap_or(0);

    format!(
        r#"# HELP sync_relay_info Server information
# TYPE sync_relay_info gauge
sync_relay_info{{version="{version}"}} 1

# HELP sync_relay_batches_total Batches acknowledged
# TYPE sync_relay_batches_total counter
sync_relay_batches_total {batches}

# HELP sync_relay_records_accepted_total Records stored for the first time
# TYPE sync_relay_records_accepted_total counter
sync_relay_records_accepted_total {accepted}

# HELP sync_relay_records_duplicate_total Records acknowledged again without a new row
# TYPE sync_relay_records_duplicate_total counter
sync_relay_records_duplicate_total {duplicates}

# HELP sync_relay_records_rejected_total Records refused by validation
# TYPE sync_relay_records_rejected_total counter
sync_relay_records_rejected_total {rejected}

# HELP sync_relay_errors_total Failed requests
# TYPE sync_relay_errors_total counter
sync_relay_errors_total {errors}

# HELP sync_relay_storage_expenses Number of expenses currently in database
# TYPE sync_relay_storage_expenses gauge
sync_relay_storage_expenses {stored}
"#,
        version = env!("CARGO_PKG_VERSION"),
    )
}
