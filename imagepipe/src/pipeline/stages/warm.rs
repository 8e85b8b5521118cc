//! Warm stage - best-effort post-processing of cache hits and misses alike.

use crate::key::ResourceKey;
use crate::pipeline::{RequestContext, Stage, StageResult};
use crate::warm::Warmer;
use tracing::warn;

/// Applies a [`Warmer`] to every successful result of the wrapped stage.
///
/// A warmer failure is logged and the unwarmed artifact is returned; it
/// never turns a success into a failure.
pub struct WarmStage<S, W> {
    inner: S,
    warmer: W,
}

impl<S, W> WarmStage<S, W>
where
    S: Stage,
    S::Output: Clone,
    W: Warmer<S::Output>,
{
    pub fn new(inner: S, warmer: W) -> Self {
        Self { inner, warmer }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S, W> Stage for WarmStage<S, W>
where
    S: Stage,
    S::Output: Clone,
    W: Warmer<S::Output>,
{
    type Output = S::Output;

    fn request(&self, key: &ResourceKey, ctx: &RequestContext) -> StageResult<S::Output> {
        match self.inner.request(key, ctx) {
            StageResult::Success(artifact) if ctx.is_abandoned() => StageResult::Success(artifact),
            StageResult::Success(artifact) => match self.warmer.warm(artifact.clone()) {
                Ok(warmed) => StageResult::Success(warmed),
                Err(e) => {
                    warn!(key = %key, error = %e, "Warming failed, returning unwarmed artifact");
                    StageResult::Success(artifact)
                }
            },
            failed => failed,
        }
    }

    fn invalidate(&self, key: &ResourceKey) {
        self.inner.invalidate(key)
    }
}
