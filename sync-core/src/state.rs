//! Drain state machine for the outbox.
//!
//! This module provides a pure, side-effect-free state machine for the
//! drain lifecycle. The state machine takes events as input and produces
//! a new state plus a list of actions to execute.
//!
//! ```text
//! Idle ──Requested──► Draining ──Acknowledged──► Idle
//!                        │
//!                        └──Failed──► Backoff ──Requested (due)──► Draining
//! ```
//!
//! The actual I/O (reading the store, submitting the batch, removing ids)
//! is performed by sync-client, not by this module.

use std::time::Duration;
use sync_types::{RecordId, Rejection};

use crate::ack::{removable_ids, FailureReason};
use crate::backoff::BackoffPolicy;

/// What asked for a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrainTrigger {
    /// The connectivity monitor saw an offline → online transition.
    Reachable,
    /// Explicit request: app foreground, periodic check, user action.
    Manual,
    /// The backoff delay elapsed.
    RetryTimer,
}

/// Drain state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainState {
    /// No drain in flight and no pending retry.
    Idle,
    /// A drain is in flight.
    Draining {
        /// Consecutive failures before this drain started.
        attempt: u32,
    },
    /// The last drain failed; waiting before retrying.
    Backoff {
        /// Consecutive failed drains so far.
        attempt: u32,
        /// Earliest time (epoch millis) a timer or manual request may retry.
        retry_at: u64,
    },
}

impl DrainState {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function apart from optional backoff jitter. The
    /// caller (sync-client) is responsible for executing the returned actions.
    pub fn on_event(self, event: Event, policy: &BackoffPolicy) -> (Self, Vec<Action>) {
        match (self, event) {
            // Offline requests are dropped in every state.
            (state, Event::Requested { online: false, .. }) => (state, vec![]),

            // From Idle
            (Self::Idle, Event::Requested { .. }) => {
                (Self::Draining { attempt: 0 }, vec![Action::TakeSnapshot])
            }

            // From Backoff: a reachability edge retries at once, anything
            // else waits for the deadline.
            (
                Self::Backoff { attempt, retry_at },
                Event::Requested { trigger, now, .. },
            ) => {
                if trigger == DrainTrigger::Reachable || now >= retry_at {
                    (Self::Draining { attempt }, vec![Action::TakeSnapshot])
                } else {
                    (Self::Backoff { attempt, retry_at }, vec![])
                }
            }

            // From Draining
            (state @ Self::Draining { .. }, Event::Requested { .. }) => {
                // Single-flight: coalesced into the drain already running.
                (state, vec![])
            }
            (Self::Draining { .. }, Event::SnapshotTaken { count: 0 }) => (Self::Idle, vec![]),
            (state @ Self::Draining { .. }, Event::SnapshotTaken { .. }) => {
                (state, vec![Action::SubmitBatch])
            }
            (Self::Draining { .. }, Event::Acknowledged { accepted, rejected }) => {
                let mut actions = Vec::with_capacity(3);
                let removable = removable_ids(&accepted, &rejected);
                if !removable.is_empty() {
                    actions.push(Action::RemoveRecords(removable));
                }
                let (accepted_count, rejected_count) = (accepted.len(), rejected.len());
                if !rejected.is_empty() {
                    actions.push(Action::EmitEvent(DrainEvent::RecordsRejected {
                        rejections: rejected,
                    }));
                }
                actions.push(Action::EmitEvent(DrainEvent::Drained {
                    accepted: accepted_count,
                    rejected: rejected_count,
                }));
                (Self::Idle, actions)
            }
            (Self::Draining { attempt }, Event::Failed { reason, now }) => {
                let next_attempt = attempt.saturating_add(1);
                let delay = policy.delay_for(next_attempt);
                let retry_at = now.saturating_add(delay.as_millis() as u64);
                (
                    Self::Backoff {
                        attempt: next_attempt,
                        retry_at,
                    },
                    vec![
                        Action::ScheduleRetry { delay, retry_at },
                        Action::EmitEvent(DrainEvent::DrainFailed {
                            reason,
                            attempt: next_attempt,
                            retry_in: delay,
                        }),
                    ],
                )
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if a drain is in flight.
    pub fn is_draining(&self) -> bool {
        matches!(self, Self::Draining { .. })
    }

    /// Check if waiting to retry after a failure.
    pub fn is_backing_off(&self) -> bool {
        matches!(self, Self::Backoff { .. })
    }

    /// Earliest retry time (epoch millis), when backing off.
    pub fn retry_at(&self) -> Option<u64> {
        match self {
            Self::Backoff { retry_at, .. } => Some(*retry_at),
            _ => None,
        }
    }

    /// Consecutive failed drains so far.
    pub fn attempt(&self) -> u32 {
        match self {
            Self::Idle => 0,
            Self::Draining { attempt } | Self::Backoff { attempt, .. } => *attempt,
        }
    }
}

impl Default for DrainState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that can occur in the drain lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Something asked for a drain.
    Requested {
        /// What asked.
        trigger: DrainTrigger,
        /// Whether the monitor currently reports the network reachable.
        online: bool,
        /// Current time, epoch millis.
        now: u64,
    },
    /// The queue snapshot was read.
    SnapshotTaken {
        /// Number of records in the snapshot.
        count: usize,
    },
    /// The receiver answered per id.
    Acknowledged {
        /// Ids accepted by the receiver.
        accepted: Vec<RecordId>,
        /// Ids permanently refused by the receiver.
        rejected: Vec<Rejection>,
    },
    /// The drain failed as a whole.
    Failed {
        /// Why it failed.
        reason: FailureReason,
        /// Current time, epoch millis.
        now: u64,
    },
}

/// Actions to be executed by the sync-client.
///
/// These are instructions, not side effects. The sync-client interprets
/// these and performs the actual I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Read a point-in-time snapshot of the queue.
    TakeSnapshot,
    /// Submit the snapshot as one batch.
    SubmitBatch,
    /// Delete exactly these ids from the store.
    RemoveRecords(Vec<RecordId>),
    /// Arrange for a retry once the delay elapses.
    ScheduleRetry {
        /// Delay before the retry.
        delay: Duration,
        /// Absolute retry time, epoch millis.
        retry_at: u64,
    },
    /// Emit an event to the application.
    EmitEvent(DrainEvent),
}

/// Events emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainEvent {
    /// A drain completed with a per-id answer.
    Drained {
        /// Records accepted by the receiver.
        accepted: usize,
        /// Records permanently refused by the receiver.
        rejected: usize,
    },
    /// The receiver refused some records; they have left the outbox.
    RecordsRejected {
        /// The refused ids and reasons.
        rejections: Vec<Rejection>,
    },
    /// A drain failed; the queue is intact.
    DrainFailed {
        /// Why it failed.
        reason: FailureReason,
        /// Consecutive failures so far.
        attempt: u32,
        /// Delay before the next automatic retry.
        retry_in: Duration,
    },
}
