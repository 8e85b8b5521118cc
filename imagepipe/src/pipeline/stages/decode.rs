//! Decode stage - turns fetched bytes into a typed artifact.

use crate::decode::Decoder;
use crate::key::ResourceKey;
use crate::pipeline::{FailureKind, RequestContext, Stage, StageError, StageResult};
use tracing::{debug, warn};

/// Wraps a byte-producing stage and decodes its output.
///
/// Decode failures are permanent: corrupt data stays corrupt. Failures from
/// the wrapped stage pass through unchanged.
pub struct DecodeStage<S, D> {
    inner: S,
    decoder: D,
}

impl<S, D> DecodeStage<S, D>
where
    S: Stage<Output = Vec<u8>>,
    D: Decoder,
{
    pub fn new(inner: S, decoder: D) -> Self {
        Self { inner, decoder }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S, D> Stage for DecodeStage<S, D>
where
    S: Stage<Output = Vec<u8>>,
    D: Decoder,
{
    type Output = D::Output;

    fn request(&self, key: &ResourceKey, ctx: &RequestContext) -> StageResult<D::Output> {
        let bytes = match self.inner.request(key, ctx) {
            StageResult::Success(bytes) => bytes,
            StageResult::Failed(e) => return StageResult::Failed(e),
        };

        if ctx.is_abandoned() {
            debug!(key = %key, "Attempt abandoned, skipping decode");
            return StageResult::Failed(StageError::permanent(
                FailureKind::Timeout,
                "attempt abandoned before decode",
            ));
        }

        match self.decoder.decode(&bytes) {
            Ok(artifact) => {
                debug!(key = %key, encoded_bytes = bytes.len(), "Decoded");
                StageResult::Success(artifact)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Decode failed");
                StageResult::Failed(StageError::permanent(FailureKind::Decode, e.to_string()))
            }
        }
    }

    fn invalidate(&self, key: &ResourceKey) {
        self.inner.invalidate(key)
    }
}
