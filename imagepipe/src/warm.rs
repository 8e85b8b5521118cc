//! Best-effort post-processing of pipeline artifacts.
//!
//! A warmer stages an artifact for whatever consumes it next (for example,
//! uploading pixels to GPU memory ahead of the first draw). Warming is an
//! optimisation: a failing warmer never turns a successful fetch into a
//! failure.

use thiserror::Error;

/// Error raised by a warmer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("warm failed: {0}")]
pub struct WarmError(pub String);

impl WarmError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Side-effecting post-processor for artifacts of type `A`.
pub trait Warmer<A>: Send + Sync + 'static {
    /// Warm `artifact`, returning it (possibly annotated) on success.
    fn warm(&self, artifact: A) -> Result<A, WarmError>;
}

/// Warmer that returns artifacts untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpWarmer;

impl<A> Warmer<A> for NoOpWarmer {
    fn warm(&self, artifact: A) -> Result<A, WarmError> {
        Ok(artifact)
    }
}

/// Adapts a closure into a [`Warmer`].
///
/// # Example
///
/// ```
/// use imagepipe::warm::{FnWarmer, WarmError, Warmer};
///
/// let warmer = FnWarmer::new(|bytes: Vec<u8>| Ok::<_, WarmError>(bytes));
/// assert_eq!(warmer.warm(vec![1, 2]).unwrap(), vec![1, 2]);
/// ```
pub struct FnWarmer<F> {
    f: F,
}

impl<F> FnWarmer<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<A, F> Warmer<A> for FnWarmer<F>
where
    F: Fn(A) -> Result<A, WarmError> + Send + Sync + 'static,
{
    fn warm(&self, artifact: A) -> Result<A, WarmError> {
        (self.f)(artifact)
    }
}

impl<A, W: Warmer<A> + ?Sized> Warmer<A> for std::sync::Arc<W> {
    fn warm(&self, artifact: A) -> Result<A, WarmError> {
        (**self).warm(artifact)
    }
}
