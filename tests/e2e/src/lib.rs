//! # expense-sync-e2e
//!
//! End-to-end tests for expense-sync.
//!
//! This crate runs a real outbox client against a real relay over HTTP on
//! loopback and checks delivery under:
//! - Normal drains and resubmission
//! - Receiver-side rejection
//! - Receiver outages and restarts
//! - Client restarts with a non-empty outbox

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assertions;
pub mod harness;

#[cfg(test)]
mod scenarios;
