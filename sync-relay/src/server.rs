//! Main IngestRelay coordination.
//!
//! IngestRelay owns storage and metrics and turns parsed batches into
//! acknowledgments.

use crate::config::Config;
use crate::error::{self, StorageError};
use crate::ingest::ParsedBatch;
use crate::storage::{ExpenseStorage, InsertOutcome, SqliteStorage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use sync_types::{BatchResponse, RecordId};
use tokio::net::TcpListener;

/// Operational metrics for monitoring relay activity.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Total batches answered with an acknowledgment.
    pub batches_total: AtomicU64,
    /// Records stored for the first time.
    pub records_accepted: AtomicU64,
    /// Records acknowledged again without a new row.
    pub records_duplicate: AtomicU64,
    /// Records refused by validation.
    pub records_rejected: AtomicU64,
    /// Requests that failed (bad body, auth, storage).
    pub errors_total: AtomicU64,
}

/// Main relay server.
#[derive(Debug)]
pub struct IngestRelay {
    config: Config,
    storage: Arc<SqliteStorage>,
    metrics: RelayMetrics,
}

impl IngestRelay {
    /// Create a new IngestRelay with the given config and storage.
    pub fn new(config: Config, storage: SqliteStorage) -> Self {
        Self {
            config,
            storage: Arc::new(storage),
            metrics: RelayMetrics::default(),
        }
    }

    /// Open the configured database and build a relay on it.
    pub async fn open(config: Config) -> error::Result<Self> {
        let storage = SqliteStorage::new(&config.storage.database).await?;
        tracing::info!("Storage ready at {}", config.storage.database.display());
        Ok(Self::new(config, storage))
    }

    /// Bind the configured listen address.
    pub async fn bind(&self) -> error::Result<TcpListener> {
        Ok(TcpListener::bind(&self.config.server.bind_address).await?)
    }

    /// Get the relay configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get access to the storage layer.
    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Record a failed request.
    pub fn record_error(&self) {
        self.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether `header` (an `Authorization` value) satisfies the configured token.
    pub fn authorize(&self, header: Option<&str>) -> bool {
        match &self.config.server.auth_token {
            None => true,
            Some(token) => header
                .and_then(|value| value.strip_prefix("Bearer "))
                .is_some_and(|presented| presented == token),
        }
    }

    /// Store the valid records of a batch and build the acknowledgment.
    ///
    /// Every valid record is acknowledged, including ids stored by an
    /// earlier submission. Rejections are passed through.
    pub async fn ingest(&self, batch: ParsedBatch) -> Result<BatchResponse, StorageError> {
        let outcomes = self.storage.insert_batch(&batch.valid).await?;

        let inserted = outcomes
            .iter()
            .filter(|o| **o == InsertOutcome::Inserted)
            .count() as u64;
        let duplicates = outcomes.len() as u64 - inserted;
        let rejected = batch.rejected.len() as u64;

        self.metrics.batches_total.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .records_accepted
            .fetch_add(inserted, Ordering::Relaxed);
        self.metrics
            .records_duplicate
            .fetch_add(duplicates, Ordering::Relaxed);
        self.metrics
            .records_rejected
            .fetch_add(rejected, Ordering::Relaxed);

        for rejection in &batch.rejected {
            tracing::warn!("Rejected record {}: {}", rejection.id, rejection.reason);
        }
        if batch.unidentifiable > 0 {
            tracing::warn!("Ignored {} records without an id", batch.unidentifiable);
        }
        tracing::info!(
            "Ingested batch: {} new, {} duplicate, {} rejected",
            inserted,
            duplicates,
            rejected
        );

        let acknowledged: Vec<RecordId> = batch.valid.into_iter().map(|r| r.id).collect();
        Ok(BatchResponse::acknowledged(acknowledged, batch.rejected))
    }
}
