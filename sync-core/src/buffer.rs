//! In-memory outbox buffer.
//!
//! This module provides the queue model shared by every store:
//! - FIFO iteration by first insertion
//! - Upsert by record id (exactly one entry per id)
//! - Removal that is safe to repeat
//!
//! Replacing an existing id keeps its queue position; the record itself is
//! swapped wholesale, never patched field by field.

use std::collections::{BTreeMap, HashMap};
use sync_types::{QueuedRecord, RecordId};

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// The id was new; the record was appended.
    Inserted,
    /// The id existed; its record was replaced in place.
    Replaced,
}

/// Ordered, id-keyed record buffer.
#[derive(Debug, Default, Clone)]
pub struct OutboxBuffer {
    /// Records by insertion sequence number.
    entries: BTreeMap<u64, QueuedRecord>,
    /// Sequence number of each id.
    index: HashMap<RecordId, u64>,
    /// Next sequence number to assign.
    next_seq: u64,
}

impl OutboxBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, or replace the record with the same id.
    pub fn upsert(&mut self, record: QueuedRecord) -> Upsert {
        if let Some(seq) = self.index.get(&record.id) {
            self.entries.insert(*seq, record);
            return Upsert::Replaced;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(record.id.clone(), seq);
        self.entries.insert(seq, record);
        Upsert::Inserted
    }

    /// Remove a record by id. Returns whether it was present.
    pub fn remove(&mut self, id: &RecordId) -> bool {
        match self.index.remove(id) {
            Some(seq) => {
                self.entries.remove(&seq);
                true
            }
            None => false,
        }
    }

    /// Remove `record` only if the buffer still holds that exact version.
    ///
    /// Returns whether it was removed. A record replaced since it was read
    /// stays queued.
    pub fn remove_if_unchanged(&mut self, record: &QueuedRecord) -> bool {
        if self.get(&record.id) != Some(record) {
            return false;
        }
        self.remove(&record.id)
    }

    /// Look up a record by id.
    pub fn get(&self, id: &RecordId) -> Option<&QueuedRecord> {
        self.index.get(id).and_then(|seq| self.entries.get(seq))
    }

    /// Check whether an id is queued.
    pub fn contains(&self, id: &RecordId) -> bool {
        self.index.contains_key(id)
    }

    /// Point-in-time copy of every record, oldest first.
    pub fn snapshot(&self) -> Vec<QueuedRecord> {
        self.entries.values().cloned().collect()
    }

    /// Iterate records oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedRecord> {
        self.entries.values()
    }

    /// Number of queued records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
