//! OutboxClient - the main interface for recording expenses offline.
//!
//! This module provides [`OutboxClient`], the API applications use to
//! capture records and observe delivery.
//!
//! # Architecture
//!
//! OutboxClient writes straight to the durable store and leaves delivery
//! to a [`SyncDrainer`], which runs the pure drain state machine from
//! sync-core against the store and a [`BatchTransport`].
//!
//! ```text
//! Application → OutboxClient → QueueStore ← SyncDrainer → BatchTransport → Network
//!                                               ↓
//!                                 sync-core (pure state machine)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sync_client::{ConnectivityMonitor, DrainerConfig, MemoryQueueStore, MockTransport, OutboxClient};
//!
//! let client = OutboxClient::new(
//!     MemoryQueueStore::new(),
//!     MockTransport::new(),
//!     ConnectivityMonitor::new(true),
//!     DrainerConfig::default(),
//! );
//!
//! let id = client.record_expense(ExpensePayload::new(4.5, "Coffee", now)).await?;
//! client.sync_now().await;
//! ```

use std::sync::Arc;
use std::time::Duration;
use sync_core::{DrainEvent, DrainTrigger};
use sync_types::{ExpensePayload, QueuedRecord, RecordId};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::clock::{Clock, SystemClock};
use crate::config::{ClientConfig, ConfigError};
use crate::drainer::{DrainReport, DrainerConfig, DrainerHandle, SyncDrainer};
use crate::monitor::{ConnectivityMonitor, TcpProbe};
use crate::store::{QueueStore, SqliteQueueStore, StoreError};
use crate::transport::{BatchTransport, HttpTransport, TransportError};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Timeout for a single reachability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// The outbox client.
///
/// Capturing a record never touches the network. Delivery happens on
/// [`sync_now`](Self::sync_now) or in the background after [`start`](Self::start).
pub struct OutboxClient<S, T> {
    store: Arc<S>,
    drainer: Arc<SyncDrainer<S, T>>,
    monitor: ConnectivityMonitor,
    clock: Arc<dyn Clock>,
    probe: Option<(TcpProbe, Duration)>,
}

impl<S: QueueStore, T: BatchTransport> OutboxClient<S, T> {
    /// Create a new OutboxClient using the system clock.
    pub fn new(store: S, transport: T, monitor: ConnectivityMonitor, config: DrainerConfig) -> Self {
        Self::with_clock(store, transport, monitor, config, Arc::new(SystemClock))
    }

    /// Create a new OutboxClient with an explicit clock.
    pub fn with_clock(
        store: S,
        transport: T,
        monitor: ConnectivityMonitor,
        config: DrainerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(store);
        let drainer = SyncDrainer::new(Arc::clone(&store), transport, monitor.clone(), config)
            .with_clock(Arc::clone(&clock));

        Self {
            store,
            drainer: Arc::new(drainer),
            monitor,
            clock,
            probe: None,
        }
    }

    /// Poll `probe` for reachability once [`start`](Self::start) is called.
    pub fn with_probe(mut self, probe: TcpProbe, interval: Duration) -> Self {
        self.probe = Some((probe, interval));
        self
    }

    /// Capture a new expense under a freshly generated id.
    ///
    /// Returns once the record is durable. Works offline.
    pub async fn record_expense(&self, payload: ExpensePayload) -> Result<RecordId, ClientError> {
        let id = RecordId::new();
        let record = QueuedRecord::new(id.clone(), payload, self.clock.now_ms() as i64);
        self.enqueue(record).await?;
        Ok(id)
    }

    /// Insert or replace a record by id.
    ///
    /// Fails with [`StoreError::InvalidRecord`] for an empty id.
    pub async fn enqueue(&self, record: QueuedRecord) -> Result<(), ClientError> {
        self.store.enqueue(record).await?;
        Ok(())
    }

    /// Every record not yet acknowledged, in queue order.
    pub async fn pending(&self) -> Result<Vec<QueuedRecord>, ClientError> {
        Ok(self.store.list_all().await?)
    }

    /// Number of records not yet acknowledged.
    pub async fn queue_size(&self) -> Result<usize, ClientError> {
        Ok(self.store.len().await?)
    }

    /// Whether the endpoint is currently believed reachable.
    pub fn is_online(&self) -> bool {
        self.monitor.is_online()
    }

    /// Drain now, unless offline, backing off, or already draining.
    pub async fn sync_now(&self) -> DrainReport {
        self.drainer.drain(DrainTrigger::Manual).await
    }

    /// Receive drain events ("sync complete", rejections, failures).
    pub fn subscribe_events(&self) -> broadcast::Receiver<DrainEvent> {
        self.drainer.subscribe_events()
    }

    /// Get a reference to the connectivity monitor.
    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    /// Get a reference to the drainer.
    pub fn drainer(&self) -> &Arc<SyncDrainer<S, T>> {
        &self.drainer
    }
}

impl<S, T> OutboxClient<S, T>
where
    S: QueueStore + 'static,
    T: BatchTransport + 'static,
{
    /// Start background delivery.
    ///
    /// Runs the drain loop and, if configured, the reachability poller.
    /// Both stop when the returned handle is dropped.
    pub fn start(&self) -> ClientHandle {
        let poller = self
            .probe
            .clone()
            .map(|(probe, interval)| self.monitor.spawn_poller(probe, interval));

        ClientHandle {
            drainer: self.drainer.spawn(),
            poller,
        }
    }
}

impl OutboxClient<SqliteQueueStore, HttpTransport> {
    /// Build a client from configuration: SQLite outbox, HTTP delivery.
    ///
    /// Does no I/O; the database opens on first use.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let store = SqliteQueueStore::open(&config.storage.database);
        let transport = HttpTransport::new(config.http_transport_config())?;
        let monitor = ConnectivityMonitor::new(config.connectivity.initially_online);

        let mut client = Self::new(store, transport, monitor, config.drainer_config());
        if let Some(address) = &config.connectivity.probe_address {
            client = client.with_probe(
                TcpProbe::new(address.clone(), PROBE_TIMEOUT),
                Duration::from_secs(config.connectivity.poll_interval_secs),
            );
        }

        tracing::info!(
            "Outbox client configured for {}",
            config.endpoint.base_url
        );
        Ok(client)
    }
}

/// Handle to background delivery. Dropping it stops everything.
#[derive(Debug)]
pub struct ClientHandle {
    drainer: DrainerHandle,
    poller: Option<JoinHandle<()>>,
}

impl ClientHandle {
    /// Whether the drain loop is still running.
    pub fn is_running(&self) -> bool {
        self.drainer.is_running()
    }
}

impl Drop for ClientHandle {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryQueueStore;
    use crate::transport::MockTransport;
    use sync_core::BackoffPolicy;

    const T0: u64 = 1_700_000_000_000;

    fn client(
        online: bool,
    ) -> (
        OutboxClient<MemoryQueueStore, MockTransport>,
        MockTransport,
        ManualClock,
    ) {
        let transport = MockTransport::new();
        let clock = ManualClock::new(T0);
        let config = DrainerConfig {
            request_timeout: Duration::from_secs(5),
            backoff: BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(10)),
            check_interval: None,
        };
        let client = OutboxClient::with_clock(
            MemoryQueueStore::new(),
            transport.clone(),
            ConnectivityMonitor::new(online),
            config,
            Arc::new(clock.clone()),
        );
        (client, transport, clock)
    }

    // ===========================================
    // Capture
    // ===========================================

    #[tokio::test]
    async fn record_expense_works_offline() {
        let (client, transport, _clock) = client(false);

        let id = client
            .record_expense(ExpensePayload::new(4.5, "Coffee", T0 as i64))
            .await
            .unwrap();

        let pending = client.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].enqueued_at, T0 as i64);
        assert_eq!(transport.submission_count(), 0);
    }

    #[tokio::test]
    async fn record_expense_generates_distinct_ids() {
        let (client, _transport, _clock) = client(true);
        let payload = ExpensePayload::new(1.0, "Misc", T0 as i64);

        let a = client.record_expense(payload.clone()).await.unwrap();
        let b = client.record_expense(payload).await.unwrap();

        assert_ne!(a, b);
        assert_eq!(client.queue_size().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn enqueue_same_id_twice_keeps_one() {
        let (client, _transport, _clock) = client(true);
        let record = QueuedRecord::new(
            RecordId::from("fixed"),
            ExpensePayload::new(1.0, "Misc", 1),
            1,
        );

        client.enqueue(record.clone()).await.unwrap();
        client.enqueue(record).await.unwrap();

        assert_eq!(client.queue_size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn enqueue_refuses_empty_id() {
        let (client, _transport, _clock) = client(true);
        let record = QueuedRecord::new(RecordId::from(""), ExpensePayload::new(1.0, "Misc", 1), 1);

        assert!(matches!(
            client.enqueue(record).await,
            Err(ClientError::Store(StoreError::InvalidRecord(_)))
        ));
        assert_eq!(client.queue_size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn capture_fails_when_store_unavailable() {
        let store = MemoryQueueStore::new();
        store.set_unavailable(Some("read-only medium"));
        let client = OutboxClient::new(
            store,
            MockTransport::new(),
            ConnectivityMonitor::new(true),
            DrainerConfig::default(),
        );

        let result = client
            .record_expense(ExpensePayload::new(1.0, "Misc", 1))
            .await;

        assert!(matches!(
            result,
            Err(ClientError::Store(StoreError::Unavailable(_)))
        ));
    }

    // ===========================================
    // Delivery
    // ===========================================

    #[tokio::test]
    async fn sync_now_delivers_and_empties_queue() {
        let (client, transport, _clock) = client(true);
        let mut events = client.subscribe_events();
        for amount in [1.0, 2.0, 3.0] {
            client
                .record_expense(ExpensePayload::new(amount, "Food", T0 as i64))
                .await
                .unwrap();
        }

        let report = client.sync_now().await;

        assert_eq!(
            report,
            DrainReport::Delivered {
                accepted: 3,
                rejected: 0,
                retained: 0
            }
        );
        assert_eq!(client.queue_size().await.unwrap(), 0);
        assert_eq!(transport.submission_count(), 1);
        assert_eq!(
            events.recv().await.unwrap(),
            DrainEvent::Drained {
                accepted: 3,
                rejected: 0
            }
        );
    }

    #[tokio::test]
    async fn offline_sync_now_is_skipped() {
        let (client, transport, _clock) = client(false);
        client
            .record_expense(ExpensePayload::new(1.0, "Food", T0 as i64))
            .await
            .unwrap();

        assert!(matches!(client.sync_now().await, DrainReport::Skipped(_)));
        assert!(!client.is_online());
        assert_eq!(transport.submission_count(), 0);
    }

    #[tokio::test]
    async fn started_client_drains_when_back_online() {
        let (client, transport, _clock) = client(false);
        let handle = client.start();
        client
            .record_expense(ExpensePayload::new(1.0, "Food", T0 as i64))
            .await
            .unwrap();

        client.monitor().report(true);

        for _ in 0..200 {
            if client.queue_size().await.unwrap() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(client.queue_size().await.unwrap(), 0);
        assert_eq!(transport.submission_count(), 1);
        assert!(handle.is_running());
    }

    // ===========================================
    // Configuration
    // ===========================================

    #[tokio::test]
    async fn from_config_is_lazy_and_durable() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ClientConfig::new("http://127.0.0.1:9");
        config.storage.database = dir.path().join("outbox.db");
        config.connectivity.initially_online = false;

        {
            let client = OutboxClient::from_config(&config).unwrap();
            assert!(!dir.path().join("outbox.db").exists());
            client
                .record_expense(ExpensePayload::new(7.0, "Travel", T0 as i64))
                .await
                .unwrap();
        }

        let restarted = OutboxClient::from_config(&config).unwrap();
        let pending = restarted.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload.category, "Travel");
    }
}
