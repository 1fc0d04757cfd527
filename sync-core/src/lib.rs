//! # sync-core
//!
//! Pure logic for the expense sync outbox (no I/O, instant tests).
//!
//! This crate implements the state machines and algorithms behind the
//! durable sync queue without any network or disk I/O, enabling fast
//! unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! Time enters only as explicit `now` arguments (epoch milliseconds), so a
//! simulated clock can drive backoff in tests.
//!
//! The actual I/O (network, disk) is performed by `sync-client`, which
//! interprets the actions produced by these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ack;
pub mod backoff;
pub mod buffer;
pub mod reachability;
pub mod state;

pub use ack::{removable_ids, resolve_ack, AckOutcome, FailureReason};
pub use backoff::{BackoffPolicy, DEFAULT_BACKOFF_CEILING, DEFAULT_BACKOFF_SEED};
pub use buffer::{OutboxBuffer, Upsert};
pub use reachability::{ReachabilityTracker, Transition};
pub use state::{Action, DrainEvent, DrainState, DrainTrigger, Event};
