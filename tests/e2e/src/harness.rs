//! Test harness: a relay on loopback and clients pointed at it.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sync_client::{
    ClientConfig, ConnectivityMonitor, DrainerConfig, HttpTransport, OutboxClient,
    SqliteQueueStore,
};
use sync_core::BackoffPolicy;
use sync_relay::config::Config;
use sync_relay::http::serve;
use sync_relay::server::IngestRelay;
use sync_relay::storage::{ExpenseStorage, SqliteStorage};
use sync_types::RecordId;
use tempfile::TempDir;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Errors that can occur while setting up a scenario.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Relay storage failed.
    #[error("relay storage error: {0}")]
    Storage(#[from] sync_relay::error::StorageError),

    /// Client construction failed.
    #[error("client error: {0}")]
    Client(#[from] sync_client::ClientError),

    /// General I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// An outbox client backed by SQLite and HTTP.
pub type TestClient = OutboxClient<SqliteQueueStore, HttpTransport>;

/// A relay on a loopback port with an on-disk database.
///
/// A harness can start down (port reserved, nothing listening) and be
/// brought up later on the same address, to simulate an outage that
/// ends while the client keeps capturing records.
pub struct RelayHarness {
    dir: TempDir,
    addr: SocketAddr,
    config: Config,
    relay: Option<Arc<IngestRelay>>,
    task: Option<JoinHandle<()>>,
}

impl RelayHarness {
    /// Start a relay with default settings on an ephemeral port.
    pub async fn start() -> Result<Self, HarnessError> {
        Self::start_with(Config::default()).await
    }

    /// Start a relay with `config` on an ephemeral port.
    ///
    /// `config.storage.database` is replaced with a temporary file.
    pub async fn start_with(config: Config) -> Result<Self, HarnessError> {
        let mut harness = Self::down_with(config).await?;
        harness.bring_up().await?;
        Ok(harness)
    }

    /// Reserve an address without serving on it.
    pub async fn down() -> Result<Self, HarnessError> {
        Self::down_with(Config::default()).await
    }

    async fn down_with(mut config: Config) -> Result<Self, HarnessError> {
        let dir = tempfile::tempdir()?;
        config.storage.database = dir.path().join("relay.db");

        // Bind then drop: the port is known, and connections are refused.
        let addr = TcpListener::bind("127.0.0.1:0").await?.local_addr()?;

        Ok(Self {
            dir,
            addr,
            config,
            relay: None,
            task: None,
        })
    }

    /// Start serving on the reserved address.
    pub async fn bring_up(&mut self) -> Result<(), HarnessError> {
        if self.task.is_some() {
            return Ok(());
        }

        let listener = TcpListener::bind(self.addr).await?;
        let storage = SqliteStorage::new(&self.config.storage.database).await?;
        let relay = Arc::new(IngestRelay::new(self.config.clone(), storage));

        let serving = Arc::clone(&relay);
        let task = tokio::spawn(async move {
            if let Err(e) = serve(listener, serving).await {
                tracing::error!("Relay stopped: {}", e);
            }
        });

        self.relay = Some(relay);
        self.task = Some(task);
        tracing::debug!("Relay listening on {}", self.addr);
        Ok(())
    }

    /// Base URL clients should use.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// The running relay, if up.
    pub fn relay(&self) -> Option<&Arc<IngestRelay>> {
        self.relay.as_ref()
    }

    /// Ids of every expense the relay has stored.
    pub async fn stored_ids(&self) -> Result<HashSet<RecordId>, HarnessError> {
        let storage = SqliteStorage::new(&self.config.storage.database).await?;
        Ok(storage.all_ids().await?.into_iter().collect())
    }

    /// Number of expenses the relay has stored.
    pub async fn stored_count(&self) -> Result<u64, HarnessError> {
        let storage = SqliteStorage::new(&self.config.storage.database).await?;
        Ok(storage.count_expenses().await?)
    }

    /// Directory holding the relay database.
    pub fn data_dir(&self) -> &Path {
        self.dir.path()
    }
}

impl Drop for RelayHarness {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Settings for test clients: short timeout and fast, jitter-free backoff.
pub fn fast_drainer_config() -> DrainerConfig {
    DrainerConfig {
        request_timeout: Duration::from_secs(2),
        backoff: BackoffPolicy::new(Duration::from_millis(50), Duration::from_millis(400)),
        check_interval: None,
    }
}

/// Build a client for `base_url` with its outbox at `outbox`.
pub fn client_at(base_url: &str, outbox: &Path, online: bool) -> Result<TestClient, HarnessError> {
    let mut config = ClientConfig::new(base_url);
    config.storage.database = outbox.to_path_buf();
    config.connectivity.initially_online = online;

    let transport = HttpTransport::new(config.http_transport_config())
        .map_err(sync_client::ClientError::from)?;
    Ok(OutboxClient::new(
        SqliteQueueStore::open(&config.storage.database),
        transport,
        ConnectivityMonitor::new(online),
        fast_drainer_config(),
    ))
}

/// A temporary location for a client outbox.
pub fn outbox_path(dir: &TempDir) -> PathBuf {
    dir.path().join("outbox.db")
}
