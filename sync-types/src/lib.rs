//! # sync-types
//!
//! Data model and wire format for the expense sync outbox.
//!
//! This crate provides the foundational types used across all expense-sync crates:
//! - [`RecordId`] - Client-generated idempotency key for a queued record
//! - [`ExpensePayload`], [`QueuedRecord`] - The unit of the outbox
//! - [`BatchRequest`], [`BatchResponse`], [`Rejection`] - `POST /sync/batch` bodies
//! - [`SyncError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod messages;
mod record;

pub use error::SyncError;
pub use ids::RecordId;
pub use messages::{BatchRequest, BatchResponse, Rejection, BATCH_PATH};
pub use record::{ExpensePayload, QueuedRecord};
