//! Mock transport for testing.
//!
//! Allows scripting acknowledgments, holding a submission in flight, and
//! capturing submitted batches for verification.

use super::{BatchTransport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use sync_types::{BatchRequest, BatchResponse};
use tokio::sync::watch;

/// Mock transport for testing.
///
/// Unless told otherwise it acknowledges every id in every batch. Clones
/// share state, so a test can keep a handle after giving one away.
#[derive(Debug, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    gate: Arc<watch::Sender<bool>>,
    submissions: Arc<watch::Sender<usize>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    sent_batches: Vec<BatchRequest>,
    scripted: VecDeque<Result<BatchResponse, TransportError>>,
    fail_all: Option<String>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            inner: Arc::default(),
            gate: Arc::new(watch::Sender::new(true)),
            submissions: Arc::new(watch::Sender::new(0)),
        }
    }
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a response to be returned by the next `submit()` call.
    pub fn queue_response(&self, response: BatchResponse) {
        self.lock().scripted.push_back(Ok(response));
    }

    /// Cause the next `submit()` to fail with the given error.
    pub fn fail_next(&self, error: TransportError) {
        self.lock().scripted.push_back(Err(error));
    }

    /// Cause every `submit()` to fail as unreachable until [`recover`](Self::recover).
    pub fn fail_all(&self, reason: &str) {
        self.lock().fail_all = Some(reason.to_string());
    }

    /// Undo [`fail_all`](Self::fail_all).
    pub fn recover(&self) {
        self.lock().fail_all = None;
    }

    /// Hold every subsequent `submit()` in flight until [`release`](Self::release).
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    /// Let held submissions complete.
    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Wait until at least `n` submissions have started.
    pub async fn wait_for_submissions(&self, n: usize) {
        let mut rx = self.submissions.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    /// Get all batches that were submitted.
    pub fn sent_batches(&self) -> Vec<BatchRequest> {
        self.lock().sent_batches.clone()
    }

    /// Get the last batch that was submitted.
    pub fn last_batch(&self) -> Option<BatchRequest> {
        self.lock().sent_batches.last().cloned()
    }

    /// Number of `submit()` calls so far.
    pub fn submission_count(&self) -> usize {
        self.lock().sent_batches.len()
    }

    /// Clear all state.
    pub fn reset(&self) {
        *self.lock() = MockTransportInner::default();
        self.submissions.send_replace(0);
        self.release();
    }
}

#[async_trait]
impl BatchTransport for MockTransport {
    async fn submit(&self, batch: &BatchRequest) -> Result<BatchResponse, TransportError> {
        let response = {
            let mut inner = self.lock();
            inner.sent_batches.push(batch.clone());
            if let Some(reason) = &inner.fail_all {
                Err(TransportError::Unreachable(reason.clone()))
            } else {
                inner
                    .scripted
                    .pop_front()
                    .unwrap_or_else(|| Ok(BatchResponse::acknowledged(batch.ids(), vec![])))
            }
        };
        self.submissions.send_modify(|count| *count += 1);

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        response
    }
}
