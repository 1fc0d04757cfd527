//! # sync-relay
//!
//! Reference ingestion endpoint for expense-sync outboxes.
//!
//! This crate implements an HTTP server that:
//! - Accepts batches of queued expense records on `POST /sync/batch`
//! - Validates each record on its own and rejects only the bad ones
//! - Stores records idempotently by id, so resubmission is harmless
//! - Answers with the exact ids it accepted
//!
//! ## Architecture
//!
//! ```text
//! Device A ──┐                    ┌── Device B
//!            │   POST /sync/batch │
//!            └─────────┬──────────┘
//!        ┌─────────────┴──────────────┐
//!        │        sync-relay          │
//!        │  ┌──────────────────────┐  │
//!        │  │  SQLite (expenses)   │  │
//!        │  └──────────────────────┘  │
//!        └────────────────────────────┘
//! ```
//!
//! ## Endpoints
//!
//! - `POST /sync/batch` → `{ success, acknowledgedIds, rejected }`
//! - `GET /health` → JSON status
//! - `GET /metrics` → Prometheus text

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod http;
pub mod ingest;
pub mod server;
pub mod storage;
