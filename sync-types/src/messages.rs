//! Batch submission protocol.
//!
//! `POST /sync/batch` with a [`BatchRequest`] body; the receiver answers
//! with a [`BatchResponse`]. Bodies are JSON.

use serde::{Deserialize, Serialize};

use crate::{QueuedRecord, RecordId, SyncError};

/// Path of the batch ingestion endpoint, relative to the server base URL.
pub const BATCH_PATH: &str = "/sync/batch";

/// Body of a batch submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Records to ingest (never empty when built through [`BatchRequest::new`]).
    pub records: Vec<QueuedRecord>,
}

impl BatchRequest {
    /// Build a batch from a snapshot of the queue.
    pub fn new(records: Vec<QueuedRecord>) -> Result<Self, SyncError> {
        if records.is_empty() {
            return Err(SyncError::EmptyBatch);
        }
        Ok(Self { records })
    }

    /// Ids of every record in the batch, in submission order.
    pub fn ids(&self) -> Vec<RecordId> {
        self.records.iter().map(|r| r.id.clone()).collect()
    }

    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch is empty (only possible for a decoded body).
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>, SyncError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self, SyncError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Explicit negative acknowledgment for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// The rejected record.
    pub id: RecordId,
    /// Why the receiver refused it.
    pub reason: String,
}

/// Body returned by the ingestion endpoint.
///
/// A conforming receiver sets `acknowledged_ids`. A receiver that can only
/// report a `count` must guarantee all-or-nothing ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    /// Whether the batch as a whole was processed.
    pub success: bool,
    /// Ids the receiver has durably accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_ids: Option<Vec<RecordId>>,
    /// Ids the receiver will never accept.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<Rejection>,
    /// Number of accepted records (all-or-nothing receivers only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    /// Failure description when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchResponse {
    /// A success response listing accepted and rejected ids.
    pub fn acknowledged(ids: Vec<RecordId>, rejected: Vec<Rejection>) -> Self {
        Self {
            success: true,
            acknowledged_ids: Some(ids),
            rejected,
            count: None,
            error: None,
        }
    }

    /// A success response carrying only a count.
    pub fn counted(count: u64) -> Self {
        Self {
            success: true,
            count: Some(count),
            ..Self::default()
        }
    }

    /// A failure response.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>, SyncError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self, SyncError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExpensePayload;

    fn record(id: &str) -> QueuedRecord {
        QueuedRecord::new(RecordId::from(id), ExpensePayload::new(1.0, "Food", 1), 1)
    }

    #[test]
    fn empty_batch_is_refused() {
        let result = BatchRequest::new(vec![]);
        assert!(matches!(result, Err(SyncError::EmptyBatch)));
    }

    #[test]
    fn batch_request_wire_shape() {
        let batch = BatchRequest::new(vec![record("a"), record("b")]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&batch.to_json().unwrap()).unwrap();

        let records = value["records"].as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["id"], "a");
        assert_eq!(records[1]["id"], "b");
        assert_eq!(batch.ids(), vec![RecordId::from("a"), RecordId::from("b")]);
    }

    #[test]
    fn parses_explicit_acknowledgment() {
        let json = br#"{"success":true,"acknowledgedIds":["a","c"]}"#;
        let response = BatchResponse::from_json(json).unwrap();

        assert!(response.success);
        assert_eq!(
            response.acknowledged_ids,
            Some(vec![RecordId::from("a"), RecordId::from("c")])
        );
        assert!(response.rejected.is_empty());
        assert_eq!(response.count, None);
    }

    #[test]
    fn parses_count_only_acknowledgment() {
        let json = br#"{"success":true,"count":3}"#;
        let response = BatchResponse::from_json(json).unwrap();

        assert_eq!(response.count, Some(3));
        assert_eq!(response.acknowledged_ids, None);
    }

    #[test]
    fn parses_rejections() {
        let json = br#"{"success":true,"acknowledgedIds":["a"],"rejected":[{"id":"b","reason":"amount must be finite"}]}"#;
        let response = BatchResponse::from_json(json).unwrap();

        assert_eq!(response.rejected.len(), 1);
        assert_eq!(response.rejected[0].id, RecordId::from("b"));
        assert_eq!(response.rejected[0].reason, "amount must be finite");
    }

    #[test]
    fn parses_failure_body() {
        let json = br#"{"success":false,"error":"Internal Server Error"}"#;
        let response = BatchResponse::from_json(json).unwrap();

        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("Internal Server Error"));
    }

    #[test]
    fn missing_success_flag_is_malformed() {
        let result = BatchResponse::from_json(br#"{"acknowledgedIds":["a"]}"#);
        assert!(matches!(result, Err(SyncError::Serialization(_))));
    }
}
