//! In-memory outbox storage.
//!
//! Not durable. Useful for tests and for hosts without a filesystem.

use super::{check_record, QueueStore, StoreError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use sync_core::OutboxBuffer;
use sync_types::{QueuedRecord, RecordId};

/// In-memory outbox storage.
///
/// Clones share the same queue.
#[derive(Debug, Default, Clone)]
pub struct MemoryQueueStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    buffer: OutboxBuffer,
    unavailable: Option<String>,
}

impl MemoryQueueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every operation fail with `reason` until cleared with `None`.
    pub fn set_unavailable(&self, reason: Option<&str>) {
        self.lock().unavailable = reason.map(str::to_string);
    }

    fn check(inner: &MemoryInner) -> Result<(), StoreError> {
        match &inner.unavailable {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn enqueue(&self, record: QueuedRecord) -> Result<(), StoreError> {
        check_record(&record)?;
        let mut inner = self.lock();
        Self::check(&inner)?;
        inner.buffer.upsert(record);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<QueuedRecord>, StoreError> {
        let inner = self.lock();
        Self::check(&inner)?;
        Ok(inner.buffer.snapshot())
    }

    async fn remove(&self, id: &RecordId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        Self::check(&inner)?;
        inner.buffer.remove(id);
        Ok(())
    }

    async fn remove_delivered(&self, delivered: &[QueuedRecord]) -> Result<usize, StoreError> {
        let mut inner = self.lock();
        Self::check(&inner)?;
        Ok(delivered
            .iter()
            .filter(|record| inner.buffer.remove_if_unchanged(record))
            .count())
    }

    async fn remove_all(&self, ids: &[RecordId]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        Self::check(&inner)?;
        for id in ids {
            inner.buffer.remove(id);
        }
        Ok(())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        let inner = self.lock();
        Self::check(&inner)?;
        Ok(inner.buffer.len())
    }
}
