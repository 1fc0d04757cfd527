//! Acknowledgment resolution.
//!
//! Turns the receiver's answer to a batch into the exact set of ids that
//! may leave the outbox. Only ids that were both submitted and explicitly
//! accounted for are ever returned; anything else stays queued.

use std::collections::HashSet;
use sync_types::{BatchResponse, RecordId, Rejection};
use thiserror::Error;

/// Why a drain attempt failed as a whole.
///
/// Every variant is transient from the outbox's point of view: nothing is
/// removed and the full remaining queue is resubmitted after backoff.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    /// The endpoint could not be reached.
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    RequestTimeout,

    /// Non-success status, or a body with `success: false`.
    #[error("server error{}: {message}", fmt_status(.status))]
    ServerError {
        /// HTTP status, when the failure came from one.
        status: Option<u16>,
        /// Error description.
        message: String,
    },

    /// The response could not be trusted as an acknowledgment.
    #[error("malformed acknowledgment: {0}")]
    MalformedAck(String),

    /// The local queue could not be read.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

/// Result of interpreting a batch response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    /// The receiver answered per id.
    Acknowledged {
        /// Submitted ids the receiver accepted, in submission order.
        accepted: Vec<RecordId>,
        /// Submitted ids the receiver permanently refused.
        rejected: Vec<Rejection>,
    },
    /// Nothing can be considered acknowledged.
    Failed(FailureReason),
}

/// Ids that leave the outbox after an acknowledgment: accepted first,
/// then rejected.
pub fn removable_ids(accepted: &[RecordId], rejected: &[Rejection]) -> Vec<RecordId> {
    accepted
        .iter()
        .cloned()
        .chain(rejected.iter().map(|r| r.id.clone()))
        .collect()
}

/// Decide which submitted ids a response acknowledges.
///
/// Rules:
/// - `success: false` acknowledges nothing.
/// - An explicit `acknowledgedIds` list is authoritative; ids that were not
///   in the batch are ignored.
/// - A bare `count` only counts when it covers every submitted id that was
///   not explicitly rejected. Any other count is treated as malformed.
/// - A success body with neither is malformed.
pub fn resolve_ack(submitted: &[RecordId], response: &BatchResponse) -> AckOutcome {
    if !response.success {
        return AckOutcome::Failed(FailureReason::ServerError {
            status: None,
            message: response
                .error
                .clone()
                .unwrap_or_else(|| "batch reported success: false".to_string()),
        });
    }

    let batch: HashSet<&RecordId> = submitted.iter().collect();

    let mut rejected_ids = HashSet::new();
    let rejected: Vec<Rejection> = response
        .rejected
        .iter()
        .filter(|r| batch.contains(&r.id) && rejected_ids.insert(r.id.clone()))
        .cloned()
        .collect();

    if let Some(acknowledged) = &response.acknowledged_ids {
        let acked: HashSet<&RecordId> = acknowledged.iter().collect();
        let accepted = submitted
            .iter()
            .filter(|id| acked.contains(id) && !rejected_ids.contains(*id))
            .cloned()
            .collect();
        return AckOutcome::Acknowledged { accepted, rejected };
    }

    if let Some(count) = response.count {
        let expected = (submitted.len() - rejected.len()) as u64;
        if count != expected {
            return AckOutcome::Failed(FailureReason::MalformedAck(format!(
                "count {} does not cover {} submitted records",
                count, expected
            )));
        }
        let accepted = submitted
            .iter()
            .filter(|id| !rejected_ids.contains(*id))
            .cloned()
            .collect();
        return AckOutcome::Acknowledged { accepted, rejected };
    }

    AckOutcome::Failed(FailureReason::MalformedAck(
        "success response without acknowledgedIds or count".to_string(),
    ))
}
