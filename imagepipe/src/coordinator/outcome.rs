//! Terminal outcomes delivered to subscribers.

use crate::key::ResourceKey;
use crate::pipeline::StageError;
use thiserror::Error;

/// Terminal failure of a coordinated fetch.
///
/// Carries the last underlying cause. From the caller's point of view a
/// terminal failure is never retryable: the coordinator has already spent
/// the retry budget (or the cause was permanent). The cause keeps its own
/// classification for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fetch of {key} failed after {attempts} attempt(s): {cause}")]
pub struct FetchError {
    key: ResourceKey,
    attempts: u32,
    #[source]
    cause: StageError,
}

impl FetchError {
    pub(crate) fn new(key: ResourceKey, attempts: u32, cause: StageError) -> Self {
        Self {
            key,
            attempts,
            cause,
        }
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The failure reported by the last attempt.
    pub fn cause(&self) -> &StageError {
        &self.cause
    }

    /// Always `false`; see the type-level docs.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// What a subscriber eventually receives for its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<A> {
    Ready(A),
    Failed(FetchError),
}

impl<A> Outcome<A> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn ready(&self) -> Option<&A> {
        match self {
            Self::Ready(artifact) => Some(artifact),
            Self::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Ready(_) => None,
            Self::Failed(e) => Some(e),
        }
    }

    pub fn into_result(self) -> Result<A, FetchError> {
        match self {
            Self::Ready(artifact) => Ok(artifact),
            Self::Failed(e) => Err(e),
        }
    }
}
