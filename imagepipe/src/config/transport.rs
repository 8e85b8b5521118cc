//! HTTP transport configuration.

use std::time::Duration;

/// Default whole-request timeout for the HTTP client.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default `User-Agent` header.
pub fn default_user_agent() -> String {
    format!("imagepipe/{}", crate::VERSION)
}

/// Settings for [`ReqwestTransport`](crate::transport::ReqwestTransport).
///
/// # Example
///
/// ```
/// use imagepipe::config::TransportConfig;
/// use std::time::Duration;
///
/// let config = TransportConfig::new()
///     .with_request_timeout(Duration::from_secs(5))
///     .with_user_agent("viewer/2.1");
/// assert_eq!(config.user_agent(), "viewer/2.1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    request_timeout: Duration,
    user_agent: String,
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-request timeout enforced by the HTTP client itself.
    ///
    /// The assembled pipeline caps it at the coordinator's attempt timeout.
    /// Default: 10 seconds.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: default_user_agent(),
        }
    }
}
