//! Batch parsing and per-record validation.
//!
//! A batch body is parsed leniently: the envelope must be a JSON object
//! with a non-empty `records` array, but each record is decoded and
//! validated on its own so one bad record never blocks the rest.

use serde::Deserialize;
use sync_types::{QueuedRecord, RecordId, Rejection};

/// Errors that make a whole batch unusable.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The body is not a batch envelope.
    #[error("invalid batch: {0}")]
    Invalid(#[from] serde_json::Error),

    /// The batch holds no records.
    #[error("batch must contain at least one record")]
    Empty,
}

#[derive(Deserialize)]
struct RawBatch {
    records: Vec<serde_json::Value>,
}

/// A batch split into storable records and rejections.
#[derive(Debug, Default)]
pub struct ParsedBatch {
    /// Records that passed validation, in submission order.
    pub valid: Vec<QueuedRecord>,
    /// Records refused, with reasons.
    pub rejected: Vec<Rejection>,
    /// Entries without a usable id; they cannot be acknowledged either way.
    pub unidentifiable: usize,
}

/// Parse a batch body and validate every record.
pub fn parse_batch(body: &[u8]) -> Result<ParsedBatch, BatchError> {
    let raw: RawBatch = serde_json::from_slice(body)?;
    if raw.records.is_empty() {
        return Err(BatchError::Empty);
    }

    let mut parsed = ParsedBatch::default();
    for value in raw.records {
        let id = value
            .get("id")
            .and_then(|id| id.as_str())
            .filter(|id| !id.is_empty())
            .map(RecordId::from);

        let Some(id) = id else {
            parsed.unidentifiable += 1;
            continue;
        };

        let verdict = serde_json::from_value::<QueuedRecord>(value)
            .map_err(|e| format!("malformed record: {}", e))
            .and_then(|record| validate_record(&record).map(|()| record));

        match verdict {
            Ok(record) => parsed.valid.push(record),
            Err(reason) => parsed.rejected.push(Rejection { id, reason }),
        }
    }

    Ok(parsed)
}

/// Check one record's fields.
///
/// Amounts must be finite and non-negative, categories non-empty, and
/// dates positive epoch milliseconds.
pub fn validate_record(record: &QueuedRecord) -> Result<(), String> {
    let payload = &record.payload;

    if !payload.amount.is_finite() {
        return Err("amount must be a finite number".to_string());
    }
    if payload.amount < 0.0 {
        return Err("amount must not be negative".to_string());
    }
    if payload.category.trim().is_empty() {
        return Err("category is required".to_string());
    }
    if payload.date <= 0 {
        return Err("date must be a positive timestamp".to_string());
    }

    Ok(())
}
