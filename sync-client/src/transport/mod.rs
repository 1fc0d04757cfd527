//! Transport abstraction for delivering batches.
//!
//! This module provides a pluggable transport layer between the drainer
//! and the remote ingestion endpoint (HTTP, mock for testing).
//!
//! # Design
//!
//! The transport is request/response: one `submit()` call carries one
//! batch and yields the receiver's acknowledgment. Interpreting that
//! acknowledgment is left to `sync_core::resolve_ack`.
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! let response = transport.submit(&batch).await?;
//! ```

mod http;
mod mock;

pub use http::{HttpTransport, HttpTransportConfig};
pub use mock::MockTransport;

use async_trait::async_trait;
use sync_core::FailureReason;
use sync_types::{BatchRequest, BatchResponse};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint could not be reached.
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    /// No answer within the request timeout.
    #[error("request timed out")]
    Timeout,

    /// The endpoint answered with a non-success status.
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The endpoint answered, but not with a readable acknowledgment.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<TransportError> for FailureReason {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unreachable(msg) => FailureReason::NetworkUnreachable(msg),
            TransportError::Timeout => FailureReason::RequestTimeout,
            TransportError::Status { status, body } => FailureReason::ServerError {
                status: Some(status),
                message: body,
            },
            TransportError::Malformed(msg) => FailureReason::MalformedAck(msg),
        }
    }
}

/// Transport trait for submitting batches to the ingestion endpoint.
///
/// Implementations handle the underlying mechanism (HTTP, mock, etc).
/// A returned `Ok` only means the receiver answered; whether any record
/// was accepted is decided from the response body.
#[async_trait]
pub trait BatchTransport: Send + Sync {
    /// Submit one batch and wait for the receiver's answer.
    async fn submit(&self, batch: &BatchRequest) -> Result<BatchResponse, TransportError>;
}
