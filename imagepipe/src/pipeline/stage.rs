//! The stage contract shared by every step of the pipeline.

use super::context::RequestContext;
use super::error::StageError;
use crate::key::ResourceKey;
use std::sync::Arc;

/// Result of a single stage request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageResult<T> {
    /// The stage produced its artifact
    Success(T),
    /// The stage (or a stage it wraps) failed
    Failed(StageError),
}

impl<T> StageResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the failure, if any.
    pub fn error(&self) -> Option<&StageError> {
        match self {
            Self::Success(_) => None,
            Self::Failed(e) => Some(e),
        }
    }

    /// Transforms a successful value, passing failures through untouched.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> StageResult<U> {
        match self {
            Self::Success(v) => StageResult::Success(f(v)),
            Self::Failed(e) => StageResult::Failed(e),
        }
    }

    pub fn into_result(self) -> Result<T, StageError> {
        match self {
            Self::Success(v) => Ok(v),
            Self::Failed(e) => Err(e),
        }
    }
}

impl<T> From<Result<T, StageError>> for StageResult<T> {
    fn from(result: Result<T, StageError>) -> Self {
        match result {
            Ok(v) => Self::Success(v),
            Err(e) => Self::Failed(e),
        }
    }
}

/// One synchronous step of the pipeline.
///
/// A stage either produces its artifact itself or delegates to a wrapped
/// inner stage, optionally transforming the result. Stages compose by
/// wrapping: the outer stage owns the inner one and calls its `request`.
///
/// `request` runs on the calling thread and may block on I/O or CPU work;
/// the coordinator is responsible for keeping it off the delivery context.
pub trait Stage: Send + Sync + 'static {
    /// The artifact this stage produces.
    type Output: Send + 'static;

    /// Produce the artifact for `key`, or a classified failure.
    ///
    /// Wrapping stages pass `ctx` to the stage they wrap unchanged.
    fn request(&self, key: &ResourceKey, ctx: &RequestContext) -> StageResult<Self::Output>;

    /// Drop any state this stage holds for `key`.
    ///
    /// Leaf stages hold nothing, so the default does nothing. Wrapping
    /// stages forward to the stage they wrap.
    fn invalidate(&self, _key: &ResourceKey) {}
}

impl<S: Stage + ?Sized> Stage for Arc<S> {
    type Output = S::Output;

    fn request(&self, key: &ResourceKey, ctx: &RequestContext) -> StageResult<Self::Output> {
        (**self).request(key, ctx)
    }

    fn invalidate(&self, key: &ResourceKey) {
        (**self).invalidate(key)
    }
}

impl<S: Stage + ?Sized> Stage for Box<S> {
    type Output = S::Output;

    fn request(&self, key: &ResourceKey, ctx: &RequestContext) -> StageResult<Self::Output> {
        (**self).request(key, ctx)
    }

    fn invalidate(&self, key: &ResourceKey) {
        (**self).invalidate(key)
    }
}
