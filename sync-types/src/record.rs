//! The unit of the outbox.

use serde::{Deserialize, Serialize};

use crate::RecordId;

/// Domain fields of an expense entry.
///
/// Opaque to the queue; only the receiver interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpensePayload {
    /// Amount spent, in the user's currency.
    pub amount: f64,
    /// Spending category ("Food", "Transport", ...).
    pub category: String,
    /// Optional free-text note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// When the expense happened, in epoch milliseconds.
    pub date: i64,
}

impl ExpensePayload {
    /// Create a payload without a note.
    pub fn new(amount: f64, category: impl Into<String>, date: i64) -> Self {
        Self {
            amount,
            category: category.into(),
            note: None,
            date,
        }
    }

    /// Attach a note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A record waiting in the outbox.
///
/// Serialized flat, so a record on disk or on the wire reads
/// `{ "id", "amount", "category", "note"?, "date", "enqueuedAt" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedRecord {
    /// Idempotency key, stable across retries.
    pub id: RecordId,
    /// Domain fields.
    #[serde(flatten)]
    pub payload: ExpensePayload,
    /// Local wall-clock time of insertion, in epoch milliseconds.
    pub enqueued_at: i64,
}

impl QueuedRecord {
    /// Create a queued record.
    pub fn new(id: RecordId, payload: ExpensePayload, enqueued_at: i64) -> Self {
        Self {
            id,
            payload,
            enqueued_at,
        }
    }
}
