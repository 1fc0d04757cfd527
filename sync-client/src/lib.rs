//! # sync-client
//!
//! Durable offline outbox for expense records.
//!
//! Records are captured locally whether or not the device is online,
//! survive process restarts, and are delivered in batches to a remote
//! ingestion endpoint once connectivity is available. A record leaves the
//! outbox only after the endpoint has acknowledged its id.
//!
//! ## Features
//!
//! - **Durable Queue**: SQLite-backed store, lazily opened, upsert by id
//! - **Batch Delivery**: one `POST /sync/batch` per drain, per-id acknowledgment
//! - **Single-Flight Drains**: concurrent drain requests coalesce
//! - **Backoff**: exponential retry with explicit, testable state
//! - **Pure State Machine**: Uses sync-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use sync_client::{ClientConfig, OutboxClient};
//! use sync_types::ExpensePayload;
//!
//! let config = ClientConfig::from_file("outbox.toml".as_ref())?;
//! let client = OutboxClient::from_config(&config)?;
//! let _running = client.start();
//!
//! // Works offline too; delivered on the next drain.
//! client.record_expense(ExpensePayload::new(12.5, "Food", now_ms)).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod clock;
pub mod config;
pub mod drainer;
pub mod monitor;
pub mod store;
pub mod transport;

pub use client::{ClientError, ClientHandle, OutboxClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClientConfig, ConfigError};
pub use drainer::{DrainReport, DrainerConfig, DrainerHandle, SkipReason, SyncDrainer};
pub use monitor::{ConnectivityMonitor, ReachabilityProbe, Subscription, TcpProbe};
pub use store::{MemoryQueueStore, QueueStore, SqliteQueueStore, StoreError};
pub use transport::{
    BatchTransport, HttpTransport, HttpTransportConfig, MockTransport, TransportError,
};

pub use sync_core::{DrainEvent, DrainState, DrainTrigger, FailureReason};

/// Events the application can listen to via [`OutboxClient::subscribe_events`].
pub type SyncEvent = DrainEvent;
