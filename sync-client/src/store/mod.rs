//! Durable queue storage for the outbox.
//!
//! A [`QueueStore`] holds captured records until the receiver has
//! acknowledged them. Records are keyed by id; enqueueing an id that is
//! already present replaces the stored record.

mod memory;
mod sqlite;

pub use memory::MemoryQueueStore;
pub use sqlite::SqliteQueueStore;

use async_trait::async_trait;
use sync_types::{QueuedRecord, RecordId};
use thiserror::Error;

/// Store errors.
///
/// Every variant means the queue could not be read or written right now.
/// None of them loses data that was already durable.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage could not be opened or is not usable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The record cannot be queued.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// A stored row could not be turned back into a record.
    #[error("corrupt queue entry {id}: {reason}")]
    Corrupt {
        /// Id of the unreadable entry.
        id: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// Refuse records no store can hold.
pub(crate) fn check_record(record: &QueuedRecord) -> Result<(), StoreError> {
    if record.id.is_empty() {
        return Err(StoreError::InvalidRecord("empty id".to_string()));
    }
    Ok(())
}

/// Trait for outbox storage backends.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Insert or replace a record by id.
    ///
    /// A replaced record keeps its position in the queue. Records with an
    /// empty id fail with [`StoreError::InvalidRecord`].
    async fn enqueue(&self, record: QueuedRecord) -> Result<(), StoreError>;

    /// Point-in-time snapshot of every pending record, in queue order.
    async fn list_all(&self) -> Result<Vec<QueuedRecord>, StoreError>;

    /// Delete one record. Removing an absent id is not an error.
    async fn remove(&self, id: &RecordId) -> Result<(), StoreError>;

    /// Delete each delivered record whose stored version is unchanged.
    ///
    /// A record replaced by a later enqueue after it was snapshotted stays
    /// queued, so the newer version is delivered by a later drain.
    /// Returns the number of records removed.
    async fn remove_delivered(&self, delivered: &[QueuedRecord]) -> Result<usize, StoreError>;

    /// Delete exactly the given ids.
    async fn remove_all(&self, ids: &[RecordId]) -> Result<(), StoreError> {
        for id in ids {
            self.remove(id).await?;
        }
        Ok(())
    }

    /// Number of pending records.
    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.list_all().await?.len())
    }
}
