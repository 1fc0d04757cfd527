//! Batch ingestion endpoint.

use crate::ingest::parse_batch;
use crate::server::IngestRelay;
use axum::{
    body::Bytes,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::sync::Arc;
use sync_types::BatchResponse;

/// `POST /sync/batch` handler.
///
/// Answers 200 with per-id acknowledgment, 400 when the body is not a
/// usable batch, 401 when a configured token is missing, and 500 when
/// storage fails.
pub async fn batch_handler(
    Extension(relay): Extension<Arc<IngestRelay>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let auth = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    if !relay.authorize(auth) {
        relay.record_error();
        return failure(StatusCode::UNAUTHORIZED, "unauthorized");
    }

    let batch = match parse_batch(&body) {
        Ok(batch) => batch,
        Err(e) => {
            tracing::debug!("Refused batch: {}", e);
            relay.record_error();
            return failure(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    match relay.ingest(batch).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            tracing::error!("Failed to store batch: {}", e);
            relay.record_error();
            failure(StatusCode::INTERNAL_SERVER_ERROR, "failed to store batch")
        }
    }
}

fn failure(status: StatusCode, message: &str) -> Response {
    (status, Json(BatchResponse::failed(message))).into_response()
}
