//! HTTP broadcast channel
//!
//! Sends posts as JSON via HTTP POST to a broadcast endpoint. The endpoint
//! is expected to answer a primary send with a JSON body containing the
//! assigned `message_id`, and to expose `threads/{message_id}` for thread
//! resolution (404 while the thread is not open yet).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{BroadcastChannel, ChannelError, ChannelResult, SendReceipt};

/// HTTP channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpChannelConfig {
    /// Broadcast endpoint URL
    pub endpoint: String,
    /// Optional authentication token (sent as Bearer token)
    pub auth_token: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Maximum retry attempts on transient failure
    #[serde(default = "default_retries")]
    pub max_retries: u32,
}

fn default_timeout() -> u64 {
    10
}

fn default_retries() -> u32 {
    3
}

impl HttpChannelConfig {
    /// Create a new configuration
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth_token: None,
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
        }
    }

    /// Set authentication token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set max retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint.is_empty() {
            return Err("Broadcast endpoint cannot be empty".to_string());
        }

        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err("Broadcast endpoint must start with http:// or https://".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    message_id: String,
}

#[derive(Debug, Deserialize)]
struct ThreadResponse {
    thread_id: String,
}

/// Broadcast channel delivering posts over HTTP
pub struct HttpBroadcastChannel {
    config: HttpChannelConfig,
    client: Client,
}

impl HttpBroadcastChannel {
    /// Create a new HTTP channel
    pub fn new(config: HttpChannelConfig) -> ChannelResult<Self> {
        config.validate().map_err(ChannelError::InvalidConfig)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChannelError::Other(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Create a channel with just an endpoint URL
    pub fn from_endpoint(endpoint: impl Into<String>) -> ChannelResult<Self> {
        Self::new(HttpChannelConfig::new(endpoint))
    }

    /// Get the endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), suffix)
    }

    fn request(&self, url: &str, payload: &serde_json::Value) -> reqwest::RequestBuilder {
        let mut request = self.client.post(url);
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }
        request.json(payload)
    }

    /// POST with retry on transient failures; client errors are final
    async fn post_with_retry(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> ChannelResult<reqwest::Response> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s...
                let delay = Duration::from_secs(2_u64.pow(attempt - 1));
                tokio::time::sleep(delay).await;
                tracing::debug!(
                    attempt = attempt + 1,
                    max = self.config.max_retries + 1,
                    "Retrying broadcast request"
                );
            }

            match self.request(url, payload).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unable to read response body".to_string());
                    last_error = Some(ChannelError::Rejected(format!("HTTP {status}: {body}")));

                    // Don't retry on client errors (4xx)
                    if status.is_client_error() {
                        break;
                    }
                }
                Err(e) => {
                    last_error = Some(ChannelError::Http(e));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ChannelError::Other("Unknown error".to_string())))
    }
}

#[async_trait]
impl BroadcastChannel for HttpBroadcastChannel {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, payload: &str) -> ChannelResult<SendReceipt> {
        let body = serde_json::json!({ "text": payload });
        let response = self.post_with_retry(&self.url("messages"), &body).await?;

        let parsed: SendResponse = response.json().await?;
        tracing::info!(message_id = %parsed.message_id, "Broadcast delivered");

        Ok(SendReceipt::new(parsed.message_id))
    }

    async fn send_follow_up(&self, payload: &str, parent_id: &str) -> ChannelResult<()> {
        let body = serde_json::json!({ "text": payload, "parent_id": parent_id });
        self.post_with_retry(&self.url("messages"), &body).await?;
        Ok(())
    }

    async fn resolve_thread_id(&self, message_id: &str) -> ChannelResult<Option<String>> {
        let url = self.url(&format!("threads/{message_id}"));
        let mut request = self.client.get(&url);
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let parsed: ThreadResponse = response.json().await?;
                Ok(Some(parsed.thread_id))
            }
            status => Err(ChannelError::Rejected(format!(
                "Thread lookup returned HTTP {status}"
            ))),
        }
    }
}
