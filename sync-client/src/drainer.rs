//! SyncDrainer - delivers the outbox to the ingestion endpoint.
//!
//! The drainer is the only component that talks to the network and the
//! only one that removes records from the store. It interprets the
//! actions of the pure [`DrainState`] machine from sync-core:
//!
//! ```text
//! trigger → DrainState → TakeSnapshot → store.list_all()
//!                      → SubmitBatch  → transport.submit()
//!                      → RemoveRecords → store.remove_delivered(acked records)
//! ```
//!
//! Only one drain runs at a time. A request arriving while a drain is in
//! flight is coalesced; records enqueued meanwhile wait for the next drain.
//! Removal matches the snapshotted version of each record, so an id that
//! is enqueued again while its drain is in flight keeps the newer payload.
//! State transitions that follow an acknowledgment are committed only
//! after the removals they call for, so a new drain never snapshots ids
//! that are about to be removed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use sync_core::{
    resolve_ack, AckOutcome, Action, BackoffPolicy, DrainEvent, DrainState, DrainTrigger, Event,
    FailureReason,
};
use sync_types::{BatchRequest, QueuedRecord, RecordId};
use tokio::sync::{broadcast, mpsc, Mutex, Notify};
use tokio::task::JoinHandle;

use crate::clock::{Clock, SystemClock};
use crate::monitor::{ConnectivityMonitor, Subscription};
use crate::store::QueueStore;
use crate::transport::BatchTransport;

/// Capacity of the event broadcast channel.
const EVENT_CAPACITY: usize = 64;

/// Drainer settings.
#[derive(Debug, Clone)]
pub struct DrainerConfig {
    /// Upper bound on one batch submission.
    pub request_timeout: Duration,
    /// Retry schedule after failed drains.
    pub backoff: BackoffPolicy,
    /// Periodic drain check for the background loop (`None` disables).
    pub check_interval: Option<Duration>,
}

impl Default for DrainerConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            backoff: BackoffPolicy::default(),
            check_interval: Some(Duration::from_secs(60)),
        }
    }
}

/// Why a drain request did nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The monitor reports the endpoint unreachable.
    Offline,
    /// A retry is scheduled and not yet due.
    BackingOff {
        /// Earliest retry time, epoch millis.
        retry_at: u64,
    },
}

/// Result of one [`SyncDrainer::drain`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainReport {
    /// Nothing was attempted.
    Skipped(SkipReason),
    /// Another drain was already in flight.
    Coalesced,
    /// The queue was empty.
    Empty,
    /// The receiver answered per id.
    Delivered {
        /// Records accepted and removed.
        accepted: usize,
        /// Records refused and removed.
        rejected: usize,
        /// Records submitted but not acknowledged; still queued.
        retained: usize,
    },
    /// The drain failed; the queue is intact.
    Failed {
        /// Why it failed.
        reason: FailureReason,
        /// Consecutive failures so far.
        attempt: u32,
        /// Earliest retry time, epoch millis.
        retry_at: u64,
    },
}

/// Drains a [`QueueStore`] through a [`BatchTransport`].
pub struct SyncDrainer<S, T> {
    store: Arc<S>,
    transport: T,
    monitor: ConnectivityMonitor,
    clock: Arc<dyn Clock>,
    config: DrainerConfig,
    state: Mutex<DrainState>,
    events: broadcast::Sender<DrainEvent>,
    rescheduled: Notify,
}

impl<S: QueueStore, T: BatchTransport> SyncDrainer<S, T> {
    /// Create a drainer using the system clock.
    pub fn new(
        store: Arc<S>,
        transport: T,
        monitor: ConnectivityMonitor,
        config: DrainerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            transport,
            monitor,
            clock: Arc::new(SystemClock),
            config,
            state: Mutex::new(DrainState::new()),
            events,
            rescheduled: Notify::new(),
        }
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get a reference to the store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a reference to the connectivity monitor.
    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    /// Current drain state.
    pub async fn state(&self) -> DrainState {
        self.state.lock().await.clone()
    }

    /// When the next automatic retry is due, if backing off.
    pub async fn next_retry_at(&self) -> Option<u64> {
        self.state.lock().await.retry_at()
    }

    /// Receive drain events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<DrainEvent> {
        self.events.subscribe()
    }

    /// Run one drain cycle.
    ///
    /// Never fails: every outcome, including failures, is described by the
    /// returned report. Records leave the store only when the receiver
    /// named them in its answer.
    pub async fn drain(&self, trigger: DrainTrigger) -> DrainReport {
        let online = self.monitor.is_online();
        let now = self.clock.now_ms();

        {
            let mut state = self.state.lock().await;
            let before = state.clone();
            let (next, actions) = before
                .clone()
                .on_event(Event::Requested { trigger, online, now }, &self.config.backoff);
            *state = next;

            if !actions.contains(&Action::TakeSnapshot) {
                let report = Self::skipped(&before, online);
                tracing::debug!("Drain request ({:?}) not started: {:?}", trigger, report);
                return report;
            }
        }

        tracing::debug!("Drain started ({:?})", trigger);

        let snapshot = match self.store.list_all().await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("Failed to read outbox: {}", e);
                return self
                    .fail(FailureReason::StorageUnavailable(e.to_string()))
                    .await;
            }
        };

        let actions = self
            .transition(Event::SnapshotTaken {
                count: snapshot.len(),
            })
            .await;
        if !actions.contains(&Action::SubmitBatch) {
            tracing::debug!("Outbox empty, nothing to drain");
            return DrainReport::Empty;
        }

        self.submit(BatchRequest { records: snapshot }).await
    }

    fn skipped(before: &DrainState, online: bool) -> DrainReport {
        if !online {
            return DrainReport::Skipped(SkipReason::Offline);
        }
        match before {
            DrainState::Backoff { retry_at, .. } => DrainReport::Skipped(SkipReason::BackingOff {
                retry_at: *retry_at,
            }),
            _ => DrainReport::Coalesced,
        }
    }

    async fn submit(&self, batch: BatchRequest) -> DrainReport {
        let submitted = batch.ids();
        tracing::info!("Submitting batch of {} records", submitted.len());

        let outcome = match tokio::time::timeout(
            self.config.request_timeout,
            self.transport.submit(&batch),
        )
        .await
        {
            Ok(Ok(response)) => resolve_ack(&submitted, &response),
            Ok(Err(e)) => AckOutcome::Failed(e.into()),
            Err(_) => AckOutcome::Failed(FailureReason::RequestTimeout),
        };

        match outcome {
            AckOutcome::Acknowledged { accepted, rejected } => {
                let (accepted_count, rejected_count) = (accepted.len(), rejected.len());
                let retained = submitted
                    .len()
                    .saturating_sub(accepted_count + rejected_count);

                let (next, actions) = self.peek(Event::Acknowledged { accepted, rejected }).await;
                self.execute(actions, &batch.records).await;
                *self.state.lock().await = next;

                tracing::info!(
                    "Drain complete: {} accepted, {} rejected, {} retained",
                    accepted_count,
                    rejected_count,
                    retained
                );
                DrainReport::Delivered {
                    accepted: accepted_count,
                    rejected: rejected_count,
                    retained,
                }
            }
            AckOutcome::Failed(reason) => self.fail(reason).await,
        }
    }

    async fn fail(&self, reason: FailureReason) -> DrainReport {
        let now = self.clock.now_ms();
        let (next, actions) = self
            .peek(Event::Failed {
                reason: reason.clone(),
                now,
            })
            .await;
        let attempt = next.attempt();
        let retry_at = next.retry_at().unwrap_or(now);

        *self.state.lock().await = next;
        self.rescheduled.notify_one();

        tracing::warn!("Drain failed (attempt {}): {}", attempt, reason);
        self.execute(actions, &[]).await;

        DrainReport::Failed {
            reason,
            attempt,
            retry_at,
        }
    }

    /// Apply an event and commit the new state at once.
    async fn transition(&self, event: Event) -> Vec<Action> {
        let mut state = self.state.lock().await;
        let (next, actions) = state.clone().on_event(event, &self.config.backoff);
        *state = next;
        actions
    }

    /// Compute the result of an event without committing it.
    async fn peek(&self, event: Event) -> (DrainState, Vec<Action>) {
        let state = self.state.lock().await;
        state.clone().on_event(event, &self.config.backoff)
    }

    async fn execute(&self, actions: Vec<Action>, delivered: &[QueuedRecord]) {
        for action in actions {
            match action {
                Action::RemoveRecords(ids) => {
                    let acked: HashSet<&RecordId> = ids.iter().collect();
                    let records: Vec<QueuedRecord> = delivered
                        .iter()
                        .filter(|r| acked.contains(&r.id))
                        .cloned()
                        .collect();
                    if let Err(e) = self.store.remove_delivered(&records).await {
                        // Left in place; resubmitted on the next drain.
                        tracing::error!(
                            "Failed to remove {} acknowledged records: {}",
                            ids.len(),
                            e
                        );
                    }
                }
                Action::EmitEvent(event) => {
                    if let DrainEvent::RecordsRejected { rejections } = &event {
                        for rejection in rejections {
                            tracing::warn!(
                                "Record {} rejected by endpoint: {}",
                                rejection.id,
                                rejection.reason
                            );
                        }
                    }
                    // No receivers is fine.
                    let _ = self.events.send(event);
                }
                Action::ScheduleRetry { delay, .. } => {
                    tracing::info!("Next drain attempt in {:?}", delay);
                }
                Action::TakeSnapshot | Action::SubmitBatch => {}
            }
        }
    }
}

impl<S, T> SyncDrainer<S, T>
where
    S: QueueStore + 'static,
    T: BatchTransport + 'static,
{
    /// Start the background drain loop.
    ///
    /// The loop drains once at startup, then on every offline → online
    /// edge, when a scheduled retry falls due, and on the periodic check
    /// if one is configured. It stops when the handle is dropped.
    pub fn spawn(self: &Arc<Self>) -> DrainerHandle {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = self.monitor.subscribe(move || {
            let _ = tx.send(DrainTrigger::Reachable);
        });

        let drainer = Arc::clone(self);
        let task = tokio::spawn(async move {
            drainer.drain(DrainTrigger::Manual).await;

            loop {
                let wake = drainer.next_wake().await;
                tokio::select! {
                    trigger = rx.recv() => match trigger {
                        Some(trigger) => {
                            drainer.drain(trigger).await;
                        }
                        None => break,
                    },
                    trigger = sleep_then(wake) => {
                        drainer.drain(trigger).await;
                    }
                    _ = drainer.rescheduled.notified() => {}
                }
            }

            tracing::debug!("Drain loop stopped");
        });

        DrainerHandle {
            _subscription: subscription,
            task,
        }
    }

    async fn next_wake(&self) -> Option<(Duration, DrainTrigger)> {
        match self.next_retry_at().await {
            Some(retry_at) => {
                let wait = retry_at.saturating_sub(self.clock.now_ms());
                Some((Duration::from_millis(wait), DrainTrigger::RetryTimer))
            }
            None => self
                .config
                .check_interval
                .map(|interval| (interval, DrainTrigger::Manual)),
        }
    }
}

async fn sleep_then(wake: Option<(Duration, DrainTrigger)>) -> DrainTrigger {
    match wake {
        Some((delay, trigger)) => {
            tokio::time::sleep(delay).await;
            trigger
        }
        None => std::future::pending().await,
    }
}

/// Handle to a running drain loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct DrainerHandle {
    _subscription: Subscription,
    task: JoinHandle<()>,
}

impl DrainerHandle {
    /// Whether the loop is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the loop and unsubscribe from the monitor.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for DrainerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
