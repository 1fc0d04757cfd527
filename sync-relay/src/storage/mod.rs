//! Storage layer for sync-relay.
//!
//! Provides idempotent expense storage keyed by record id.

mod sqlite;

pub use sqlite::SqliteStorage;

use crate::error::StorageError;
use async_trait::async_trait;
use sync_types::{QueuedRecord, RecordId};

/// An expense as persisted by the relay.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredExpense {
    /// The record as first received.
    pub record: QueuedRecord,
    /// Unix timestamp (seconds) when the relay first stored it.
    pub received_at: i64,
}

/// What happened to one record on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// First time this id was seen.
    Inserted,
    /// The id was already stored; nothing changed.
    Duplicate,
}

/// Trait for expense storage backends.
#[async_trait]
pub trait ExpenseStorage: Send + Sync {
    /// Store a record unless its id is already present.
    async fn insert_expense(&self, record: &QueuedRecord) -> Result<InsertOutcome, StorageError>;

    /// Store several records in one transaction.
    ///
    /// Returns one outcome per input record, in order.
    async fn insert_batch(
        &self,
        records: &[QueuedRecord],
    ) -> Result<Vec<InsertOutcome>, StorageError>;

    /// Look up a stored expense by id.
    async fn get_expense(&self, id: &RecordId) -> Result<Option<StoredExpense>, StorageError>;

    /// Ids of every stored expense.
    async fn all_ids(&self) -> Result<Vec<RecordId>, StorageError>;

    /// Total number of stored expenses.
    async fn count_expenses(&self) -> Result<u64, StorageError>;
}
