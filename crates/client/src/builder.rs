//! Builder pattern for constructing a [`StreamClient`].

use std::sync::Arc;
use std::time::Duration;

use sr_domain::config::ClientConfig;

use crate::client::StreamClient;
use crate::reconnect::ReconnectPolicy;
use crate::transport::{HttpTransport, Transport};
use crate::types::ClientError;

/// Fluent builder for [`StreamClient`].
///
/// # Example
///
/// ```rust,no_run
/// # use sr_client::StreamClientBuilder;
/// let client = StreamClientBuilder::new()
///     .url("http://localhost:3000/connect")
///     .reconnect_interval(std::time::Duration::from_secs(3))
///     .max_reconnect_attempts(5)
///     .build()
///     .unwrap();
/// ```
pub struct StreamClientBuilder {
    url: String,
    http: Option<reqwest::Client>,
    transport: Option<Arc<dyn Transport>>,
    policy: ReconnectPolicy,
}

impl StreamClientBuilder {
    pub fn new() -> Self {
        Self {
            url: String::new(),
            http: None,
            transport: None,
            policy: ReconnectPolicy::default(),
        }
    }

    /// Seed url and reconnect settings from a `[client]` config section.
    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self::new().url(cfg.url.clone()).policy(ReconnectPolicy::from(cfg))
    }

    // ── Transport ────────────────────────────────────────────────────

    /// Stream endpoint (e.g. `http://localhost:3000/connect`).
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Reuse an existing `reqwest` client for the HTTP transport.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Replace the HTTP transport entirely.  `url` is ignored when set.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    // ── Reconnect ────────────────────────────────────────────────────

    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.policy.enabled = enabled;
        self
    }

    /// Fixed delay before each reconnect attempt (default 3s).
    pub fn reconnect_interval(mut self, d: Duration) -> Self {
        self.policy.interval = d;
        self
    }

    /// Attempts allowed before giving up (default 5).
    pub fn max_reconnect_attempts(mut self, n: u32) -> Self {
        self.policy.max_attempts = n;
        self
    }

    pub fn policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build the [`StreamClient`].
    pub fn build(self) -> Result<StreamClient, ClientError> {
        let transport = match self.transport {
            Some(t) => t,
            None => {
                if self.url.is_empty() {
                    return Err(ClientError::Config("url is required".into()));
                }
                let http = self.http.unwrap_or_default();
                Arc::new(HttpTransport::with_client(http, self.url))
            }
        };
        Ok(StreamClient::new(transport, self.policy))
    }
}

impl Default for StreamClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
