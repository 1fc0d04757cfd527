//! HTTP transport.
//!
//! Posts the batch as JSON to `{base_url}/sync/batch` and parses the
//! JSON acknowledgment.

use super::{BatchTransport, TransportError};
use async_trait::async_trait;
use std::time::Duration;
use sync_types::{BatchRequest, BatchResponse, BATCH_PATH};

/// Settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Base URL of the ingestion service, e.g. `https://api.example.com`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Optional bearer token sent with every request.
    pub bearer_token: Option<String>,
}

impl HttpTransportConfig {
    /// Config for `base_url` with a 30 second timeout and no token.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            bearer_token: None,
        }
    }
}

/// Batch transport over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl HttpTransport {
    /// Build a transport for the given endpoint.
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Unreachable(format!("http client: {}", e)))?;

        let endpoint = format!("{}{}", config.base_url.trim_end_matches('/'), BATCH_PATH);

        Ok(Self {
            client,
            endpoint,
            bearer_token: config.bearer_token,
        })
    }

    /// Full URL batches are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl BatchTransport for HttpTransport {
    async fn submit(&self, batch: &BatchRequest) -> Result<BatchResponse, TransportError> {
        let mut request = self.client.post(&self.endpoint).json(batch);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(classify)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("Endpoint {} answered {}", self.endpoint, status);
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(classify)?;
        BatchResponse::from_json(&bytes).map_err(|e| TransportError::Malformed(e.to_string()))
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Unreachable(err.to_string())
    }
}
