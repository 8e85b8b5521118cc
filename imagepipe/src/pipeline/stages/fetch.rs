//! Fetch stage - turns a key into raw bytes via the transport.

use crate::key::ResourceKey;
use crate::pipeline::{FailureKind, RequestContext, Stage, StageError, StageResult};
use crate::transport::{Transport, TransportError};
use tracing::debug;

/// Leaf stage that downloads the bytes behind a key.
///
/// Transport failures are classified here, at their origin: connection
/// problems, timeouts and server-side statuses are retryable; client-side
/// statuses and malformed URLs are not.
pub struct FetchStage<T> {
    transport: T,
}

impl<T: Transport> FetchStage<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

/// Maps transport errors to stage errors with retry semantics.
fn map_transport_error(err: TransportError) -> StageError {
    let retryable = err.is_retryable();
    let kind = match &err {
        TransportError::InvalidUrl { .. } => FailureKind::InvalidKey,
        TransportError::Connect(_) | TransportError::Body(_) => FailureKind::Transport,
        TransportError::Timeout(_) => FailureKind::Timeout,
        TransportError::Status { status, .. } => FailureKind::Http { status: *status },
        TransportError::Client(_) => FailureKind::Internal,
    };

    if retryable {
        StageError::retryable(kind, err.to_string())
    } else {
        StageError::permanent(kind, err.to_string())
    }
}

impl<T: Transport> Stage for FetchStage<T> {
    type Output = Vec<u8>;

    fn request(&self, key: &ResourceKey, _ctx: &RequestContext) -> StageResult<Vec<u8>> {
        match self.transport.get(key.as_str()) {
            Ok(bytes) => {
                debug!(key = %key, bytes = bytes.len(), "Fetched");
                StageResult::Success(bytes)
            }
            Err(e) => {
                let err = map_transport_error(e);
                debug!(key = %key, error = %err, retryable = err.is_retryable(), "Fetch failed");
                StageResult::Failed(err)
            }
        }
    }
}
