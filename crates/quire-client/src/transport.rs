use async_trait::async_trait;
use quire_core::{RpcCall, RpcFailure, RpcTransport, StructuredError};
use quire_versioning::{Result, VersioningError};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Default server address
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:7878";

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Server base URL, without the `/rpc` suffix
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVER_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl HttpTransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

/// [`RpcTransport`] that posts calls to a Quire server
pub struct HttpTransport {
    endpoint: String,
    client: Client,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VersioningError::transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: format!("{}/rpc", config.base_url.trim_end_matches('/')),
            client,
        })
    }

    /// Transport to `base_url` with default settings
    pub fn connect(base_url: &str) -> Result<Self> {
        Self::new(HttpTransportConfig::new(base_url))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Interpret a non-success response
///
/// A body that is not a well-formed structured error (including one with a
/// kind this client does not know) says nothing reliable about the call, so
/// it is a transport failure.
fn failure_from_body(method: &str, status: StatusCode, body: &str) -> RpcFailure {
    match serde_json::from_str::<StructuredError>(body) {
        Ok(err) => {
            debug!("{} rejected by server: {}", method, err);
            RpcFailure::Remote(err)
        }
        Err(_) => {
            warn!("{} failed with status {}: {}", method, status, body);
            RpcFailure::transport(format!(
                "{} failed with status {}: {}",
                method, status, body
            ))
        }
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(&self, call: RpcCall) -> std::result::Result<Value, RpcFailure> {
        let method = call.method();
        debug!("POST {} ({})", self.endpoint, method);

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&call)
            .send()
            .await
            .map_err(|e| RpcFailure::transport(format!("HTTP request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(failure_from_body(method, status, &body));
        }

        resp.json::<Value>().await.map_err(|e| {
            RpcFailure::transport(format!("Failed to parse {} response: {}", method, e))
        })
    }
}
