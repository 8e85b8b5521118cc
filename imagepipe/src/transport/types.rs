//! Transport trait and error classification.

use thiserror::Error;

/// Errors that can occur while fetching raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// URL could not be parsed or uses an unsupported scheme
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Could not establish or keep a connection
    #[error("connection failed: {0}")]
    Connect(String),

    /// The transport's own request timeout fired
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Response body could not be read
    #[error("failed to read response body: {0}")]
    Body(String),

    /// HTTP client could not be constructed
    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

impl TransportError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Connection-level problems and server-side statuses (5xx, 408, 429)
    /// are transient. Client-side statuses and malformed URLs are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Connect(_) | TransportError::Timeout(_) | TransportError::Body(_) => {
                true
            }
            TransportError::Status { status, .. } => is_retryable_status(*status),
            TransportError::InvalidUrl { .. } | TransportError::Client(_) => false,
        }
    }
}

/// Classify an HTTP status code.
pub fn is_retryable_status(status: u16) -> bool {
    status >= 500 || status == 408 || status == 429
}

/// Blocking byte fetcher for a URL.
///
/// This abstraction lets the fetch stage be driven by a real HTTP client in
/// production and by scripted mocks in tests.
pub trait Transport: Send + Sync + 'static {
    /// Performs a GET request and returns the response body.
    fn get(&self, url: &str) -> Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn get(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        (**self).get(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failures_are_retryable() {
        assert!(TransportError::Connect("refused".into()).is_retryable());
        assert!(TransportError::Timeout("30s".into()).is_retryable());
        assert!(TransportError::Body("reset".into()).is_retryable());
    }

    #[test]
    fn test_server_statuses_are_retryable() {
        for status in [500, 502, 503, 504, 408, 429] {
            let err = TransportError::Status {
                status,
                url: "https://x".into(),
            };
            assert!(err.is_retryable(), "status {} should be retryable", status);
        }
    }

    #[test]
    fn test_client_statuses_are_permanent() {
        for status in [400, 401, 403, 404, 410] {
            let err = TransportError::Status {
                status,
                url: "https://x".into(),
            };
            assert!(!err.is_retryable(), "status {} should be permanent", status);
        }
    }

    #[test]
    fn test_invalid_url_is_permanent() {
        let err = TransportError::InvalidUrl {
            url: "::nope".into(),
            reason: "relative URL without a base".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(
            format!("{}", err),
            "invalid URL '::nope': relative URL without a base"
        );
    }
}
