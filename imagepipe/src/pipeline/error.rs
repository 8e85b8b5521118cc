//! Error types for pipeline stages.
//!
//! Failures are classified where they originate. Only the producing stage
//! knows whether a failure is transient, so the retryable flag is set once
//! and carried unchanged through every wrapping stage.

use std::fmt;
use thiserror::Error;

/// Broad category of a stage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connectivity problem, reset connection, truncated body
    Transport,
    /// Non-success HTTP status
    Http { status: u16 },
    /// Key could not be turned into a request (e.g., malformed URL)
    InvalidKey,
    /// Bytes could not be decoded into an artifact
    Decode,
    /// Attempt exceeded its time budget
    Timeout,
    /// Cache bookkeeping failure
    Cache,
    /// Background task panicked or was torn down
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transport => write!(f, "transport"),
            FailureKind::Http { status } => write!(f, "HTTP {}", status),
            FailureKind::InvalidKey => write!(f, "invalid key"),
            FailureKind::Decode => write!(f, "decode"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Cache => write!(f, "cache"),
            FailureKind::Internal => write!(f, "internal"),
        }
    }
}

/// A failure produced by a pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} failure: {message}")]
pub struct StageError {
    kind: FailureKind,
    message: String,
    retryable: bool,
}

impl StageError {
    /// A failure that may succeed if the whole pipeline is attempted again.
    pub fn retryable(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: true,
        }
    }

    /// A failure that will not change on retry.
    pub fn permanent(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: false,
        }
    }

    /// An attempt that ran past its time budget. Always retryable.
    pub fn timeout(budget: std::time::Duration) -> Self {
        Self::retryable(
            FailureKind::Timeout,
            format!("attempt exceeded {:?}", budget),
        )
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_retryable_error() {
        let err = StageError::retryable(FailureKind::Transport, "connection reset");
        assert!(err.is_retryable());
        assert_eq!(err.kind(), FailureKind::Transport);
        assert_eq!(err.message(), "connection reset");
    }

    #[test]
    fn test_permanent_error() {
        let err = StageError::permanent(FailureKind::Http { status: 404 }, "not found");
        assert!(!err.is_retryable());
        assert_eq!(format!("{}", err), "HTTP 404 failure: not found");
    }

    #[test]
    fn test_timeout_error_is_retryable() {
        let err = StageError::timeout(Duration::from_millis(10));
        assert!(err.is_retryable());
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert_eq!(format!("{}", err), "timeout failure: attempt exceeded 10ms");
    }
}
