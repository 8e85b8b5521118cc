//! Memory cache stage - serves repeat requests without touching the network.

use crate::artifact::Artifact;
use crate::cache::{InsertOutcome, MemoryCache};
use crate::key::ResourceKey;
use crate::pipeline::{RequestContext, Stage, StageResult};
use std::sync::Arc;
use tracing::debug;

/// Puts a [`MemoryCache`] in front of a wrapped stage.
///
/// - Hit: returns the cached artifact and refreshes its recency; the
///   wrapped stage is not invoked.
/// - Miss: invokes the wrapped stage; a success is stored before being
///   returned (or bypasses the cache when it alone exceeds the budget).
/// - Failure: passed through unchanged, nothing is stored.
/// - Abandoned attempt: the result is returned but never stored.
///
/// The cache lock is never held while the wrapped stage runs, so a slow
/// miss does not block hits on other keys.
pub struct MemoryCacheStage<S: Stage> {
    inner: S,
    cache: Arc<MemoryCache<S::Output>>,
}

impl<S> MemoryCacheStage<S>
where
    S: Stage,
    S::Output: Artifact + Clone,
{
    /// Wrap `inner` with a new cache of `max_size_bytes`.
    pub fn new(inner: S, max_size_bytes: usize) -> Self {
        Self::with_cache(inner, Arc::new(MemoryCache::new(max_size_bytes)))
    }

    /// Wrap `inner` with a shared cache handle.
    pub fn with_cache(inner: S, cache: Arc<MemoryCache<S::Output>>) -> Self {
        Self { inner, cache }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Shared handle to the underlying cache (for stats and inspection).
    pub fn cache(&self) -> &Arc<MemoryCache<S::Output>> {
        &self.cache
    }
}

impl<S> Stage for MemoryCacheStage<S>
where
    S: Stage,
    S::Output: Artifact + Clone,
{
    type Output = S::Output;

    fn request(&self, key: &ResourceKey, ctx: &RequestContext) -> StageResult<S::Output> {
        if let Some(artifact) = self.cache.get(key) {
            debug!(key = %key, "Memory cache hit");
            return StageResult::Success(artifact);
        }

        match self.inner.request(key, ctx) {
            StageResult::Success(artifact) if ctx.is_abandoned() => {
                debug!(key = %key, "Attempt abandoned, not caching");
                StageResult::Success(artifact)
            }
            StageResult::Success(artifact) => {
                match self.cache.insert(key.clone(), artifact.clone()) {
                    InsertOutcome::Cached { evicted } => {
                        debug!(key = %key, evicted, "Cached artifact");
                    }
                    InsertOutcome::Bypassed => {
                        debug!(
                            key = %key,
                            size = artifact.accounted_size(),
                            budget = self.cache.max_size_bytes(),
                            "Artifact exceeds cache budget, not cached"
                        );
                    }
                }
                StageResult::Success(artifact)
            }
            failed => failed,
        }
    }

    fn invalidate(&self, key: &ResourceKey) {
        if self.cache.remove(key).is_some() {
            debug!(key = %key, "Invalidated cached artifact");
        }
        self.inner.invalidate(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{FailureKind, StageError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Produces `size` bytes for every key and counts calls.
    struct FixedSize {
        size: usize,
        calls: AtomicUsize,
    }

    impl FixedSize {
        fn new(size: usize) -> Self {
            Self {
                size,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Stage for FixedSize {
        type Output = Vec<u8>;

        fn request(&self, _key: &ResourceKey, _ctx: &RequestContext) -> StageResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            StageResult::Success(vec![7u8; self.size])
        }
    }

    struct Failing;

    impl Stage for Failing {
        type Output = Vec<u8>;

        fn request(&self, _key: &ResourceKey, _ctx: &RequestContext) -> StageResult<Vec<u8>> {
            StageResult::Failed(StageError::retryable(FailureKind::Transport, "reset"))
        }
    }

    fn key(name: &str) -> ResourceKey {
        ResourceKey::new(format!("https://cdn.example.com/{}", name))
    }

    #[test]
    fn test_miss_then_hit_invokes_inner_once() {
        let stage = MemoryCacheStage::new(FixedSize::new(10), 1000);

        assert!(stage.request(&key("a"), &RequestContext::new()).is_success());
        assert!(stage.request(&key("a"), &RequestContext::new()).is_success());

        assert_eq!(stage.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(stage.cache().stats().hits, 1);
        assert_eq!(stage.cache().stats().misses, 1);
    }

    #[test]
    fn test_failure_passes_through_and_is_not_cached() {
        let stage = MemoryCacheStage::new(Failing, 1000);

        let err = stage.request(&key("a"), &RequestContext::new()).into_result().unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(stage.cache().entry_count(), 0);
    }

    #[test]
    fn test_oversized_artifact_is_returned_but_not_cached() {
        let stage = MemoryCacheStage::new(FixedSize::new(2000), 1000);

        assert_eq!(
            stage.request(&key("big"), &RequestContext::new()),
            StageResult::Success(vec![7u8; 2000])
        );
        assert!(!stage.cache().contains(&key("big")));

        stage.request(&key("big"), &RequestContext::new());
        assert_eq!(stage.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_evicted_key_behaves_like_never_cached() {
        let stage = MemoryCacheStage::new(FixedSize::new(600), 1000);

        stage.request(&key("a"), &RequestContext::new());
        stage.request(&key("b"), &RequestContext::new());
        assert!(!stage.cache().contains(&key("a")));

        stage.request(&key("a"), &RequestContext::new());
        assert_eq!(stage.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_abandoned_attempt_is_returned_but_not_cached() {
        let stage = MemoryCacheStage::new(FixedSize::new(10), 1000);
        let context = RequestContext::new();
        context.abandon();

        assert!(stage.request(&key("a"), &context).is_success());
        assert!(!stage.cache().contains(&key("a")));

        stage.request(&key("a"), &RequestContext::new());
        assert!(stage.cache().contains(&key("a")));
        assert_eq!(stage.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalidate_forces_refetch() {
        let stage = MemoryCacheStage::new(FixedSize::new(10), 1000);

        stage.request(&key("a"), &RequestContext::new());
        stage.invalidate(&key("a"));
        stage.request(&key("a"), &RequestContext::new());

        assert_eq!(stage.inner.calls.load(Ordering::SeqCst), 2);
    }
}
