//! Configuration loading for the outbox client.
//!
//! Configuration is loaded from a TOML file. Only `[endpoint]` is required;
//! every other section falls back to its defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sync_core::BackoffPolicy;

use crate::drainer::DrainerConfig;
use crate::transport::HttpTransportConfig;

/// Root configuration for the outbox client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Remote ingestion endpoint.
    pub endpoint: EndpointConfig,
    /// Local queue storage.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Retry schedule.
    #[serde(default)]
    pub backoff: BackoffConfig,
    /// Drain loop settings.
    #[serde(default)]
    pub drain: DrainConfig,
    /// Reachability detection.
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
}

/// Remote ingestion endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Base URL; batches go to `{base_url}/sync/batch`.
    pub base_url: String,
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Bearer token identifying the caller (optional).
    pub bearer_token: Option<String>,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite outbox database.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

/// Backoff configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BackoffConfig {
    /// First retry delay in milliseconds (default: 2000).
    #[serde(default = "default_seed_ms")]
    pub seed_ms: u64,
    /// Longest retry delay in milliseconds (default: 300000 = 5 minutes).
    #[serde(default = "default_ceiling_ms")]
    pub ceiling_ms: u64,
    /// Random extra delay of up to this many milliseconds (default: 0).
    #[serde(default)]
    pub jitter_ms: u64,
}

/// Drain loop configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DrainConfig {
    /// Periodic drain check in seconds, 0 to disable (default: 60).
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

/// Connectivity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectivityConfig {
    /// Assume the endpoint is reachable at startup (default: true).
    #[serde(default = "default_initially_online")]
    pub initially_online: bool,
    /// `host:port` to probe with TCP connects (optional).
    pub probe_address: Option<String>,
    /// Probe interval in seconds (default: 15).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

// Default value functions
fn default_timeout_secs() -> u64 {
    30
}

fn default_database_path() -> PathBuf {
    PathBuf::from("outbox.db")
}

fn default_seed_ms() -> u64 {
    2_000
}

fn default_ceiling_ms() -> u64 {
    300_000 // 5 minutes
}

fn default_check_interval() -> u64 {
    60
}

fn default_initially_online() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    15
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            seed_ms: default_seed_ms(),
            ceiling_ms: default_ceiling_ms(),
            jitter_ms: 0,
        }
    }
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
        }
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            initially_online: default_initially_online(),
            probe_address: None,
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl ClientConfig {
    /// Minimal configuration for `base_url`, everything else default.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            endpoint: EndpointConfig {
                base_url: base_url.into(),
                timeout_secs: default_timeout_secs(),
                bearer_token: None,
            },
            storage: StorageConfig::default(),
            backoff: BackoffConfig::default(),
            drain: DrainConfig::default(),
            connectivity: ConnectivityConfig::default(),
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.endpoint.timeout_secs)
    }

    /// The configured retry schedule.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.backoff.seed_ms),
            Duration::from_millis(self.backoff.ceiling_ms),
        )
        .with_jitter(Duration::from_millis(self.backoff.jitter_ms))
    }

    /// Settings for the drainer.
    pub fn drainer_config(&self) -> DrainerConfig {
        DrainerConfig {
            request_timeout: self.request_timeout(),
            backoff: self.backoff_policy(),
            check_interval: match self.drain.check_interval_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }

    /// Settings for the HTTP transport.
    pub fn http_transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            base_url: self.endpoint.base_url.clone(),
            timeout: self.request_timeout(),
            bearer_token: self.endpoint.bearer_token.clone(),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let toml = r#"
[endpoint]
base_url = "https://api.example.com"
"#;
        let config: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.endpoint.timeout_secs, 30);
        assert_eq!(config.storage.database, PathBuf::from("outbox.db"));
        assert_eq!(config.backoff.seed_ms, 2_000);
        assert_eq!(config.backoff.ceiling_ms, 300_000);
        assert!(config.connectivity.initially_online);
        assert!(config.connectivity.probe_address.is_none());
    }

    #[test]
    fn full_config_from_toml_string() {
        let toml = r#"
[endpoint]
base_url = "https://api.example.com"
timeout_secs = 10
bearer_token = "abc"

[storage]
database = "/data/outbox.db"

[backoff]
seed_ms = 500
ceiling_ms = 10000
jitter_ms = 100

[drain]
check_interval_secs = 0

[connectivity]
initially_online = false
probe_address = "api.example.com:443"
poll_interval_secs = 5
"#;
        let config: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.endpoint.bearer_token.as_deref(), Some("abc"));
        assert_eq!(config.storage.database, PathBuf::from("/data/outbox.db"));
        assert_eq!(config.drainer_config().check_interval, None);
        assert_eq!(config.drainer_config().request_timeout, Duration::from_secs(10));
        assert_eq!(
            config.backoff_policy().base_delay(1),
            Duration::from_millis(500)
        );
        assert_eq!(
            config.connectivity.probe_address.as_deref(),
            Some("api.example.com:443")
        );
        assert!(!config.connectivity.initially_online);
    }

    #[test]
    fn endpoint_section_is_required() {
        let result: Result<ClientConfig, _> = toml::from_str("[storage]\n");
        assert!(result.is_err());
    }

    #[test]
    fn http_transport_config_carries_endpoint() {
        let mut config = ClientConfig::new("http://localhost:8080");
        config.endpoint.bearer_token = Some("t".into());
        let http = config.http_transport_config();
        assert_eq!(http.base_url, "http://localhost:8080");
        assert_eq!(http.timeout, Duration::from_secs(30));
        assert_eq!(http.bearer_token.as_deref(), Some("t"));
    }

    #[test]
    fn from_file_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outbox.toml");
        std::fs::write(&path, "[endpoint]\nbase_url = \"http://relay\"\n").unwrap();

        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.endpoint.base_url, "http://relay");
    }
}
