//! Deduplicating, retrying fan-out over a synchronous stage chain.

use super::config::CoordinatorConfig;
use super::outcome::{FetchError, Outcome};
use super::stats::{CoordinatorStats, StatsCounters};
use super::subscription::{Subscription, Unsubscribe};
use crate::key::ResourceKey;
use crate::pipeline::{FailureKind, RequestContext, Stage, StageError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{oneshot, Mutex as AttemptGate, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

/// Subscribers waiting on one outstanding execution.
struct InFlight<A> {
    subscribers: HashMap<u64, oneshot::Sender<Outcome<A>>>,
}

impl<A> InFlight<A> {
    fn new() -> Self {
        Self {
            subscribers: HashMap::new(),
        }
    }
}

struct Shared<S: Stage> {
    stage: Arc<S>,
    config: CoordinatorConfig,
    /// Outstanding executions keyed by resource. A key's presence is its
    /// membership of the outstanding set; the entry holds its subscribers.
    state: Mutex<HashMap<ResourceKey, InFlight<S::Output>>>,
    /// One gate per key, held by whichever attempt is running the stage
    /// chain for it. An abandoned attempt keeps its gate until it returns.
    gates: Mutex<HashMap<ResourceKey, Arc<AttemptGate<()>>>>,
    next_id: AtomicU64,
    stats: StatsCounters,
}

/// Turns a synchronous stage chain into an asynchronous, deduplicated,
/// retrying fan-out service.
///
/// # Architecture
///
/// ```text
/// fetch(k) ─┐
///           │                         spawn_blocking
/// fetch(k) ─┼──► AssetCoordinator ───────────────────► Stage::request(k)
///           │         │   ▲                                   │
/// fetch(k) ─┘         │   └──── timeout / retry loop ◄────────┘
///                     ▼
///            [every subscriber receives the same outcome]
/// ```
///
/// Per key there is at most one execution at a time. A `fetch` for a key
/// with an outstanding execution joins it; otherwise a new execution is
/// started. When the execution reaches its terminal outcome the key leaves
/// the outstanding set and every subscriber registered at that moment
/// receives exactly one outcome. Later subscribers start a fresh execution
/// (which is usually answered by the cache stage).
///
/// Retryable failures are retried invisibly up to the configured attempt
/// budget. Only the final outcome is delivered.
///
/// An attempt that exceeds its timeout is abandoned: its blocking work
/// cannot be interrupted, so it is flagged through its [`RequestContext`]
/// (stages skip side effects such as caching) and keeps the key's attempt
/// gate until it returns. The next attempt for the key waits for that gate,
/// so one key never has two stage invocations running at once.
///
/// Cloning is cheap and clones share all state.
pub struct AssetCoordinator<S: Stage> {
    shared: Arc<Shared<S>>,
}

impl<S: Stage> Clone for AssetCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> AssetCoordinator<S>
where
    S: Stage,
    S::Output: Clone,
{
    pub fn new(stage: S, config: CoordinatorConfig) -> Self {
        Self::with_shared_stage(Arc::new(stage), config)
    }

    /// Coordinate a stage chain that is also used elsewhere.
    pub fn with_shared_stage(stage: Arc<S>, config: CoordinatorConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                stage,
                config,
                state: Mutex::new(HashMap::new()),
                gates: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                stats: StatsCounters::default(),
            }),
        }
    }

    /// Subscribe to the outcome for `key`.
    ///
    /// Registers the caller and returns immediately. If no execution for
    /// `key` is outstanding, one is scheduled on the blocking pool.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn fetch(&self, key: impl Into<ResourceKey>) -> Subscription<S::Output> {
        let key = key.into();
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();

        let start = {
            let mut state = self.shared.lock_state();
            match state.get_mut(&key) {
                Some(in_flight) => {
                    in_flight.subscribers.insert(id, sender);
                    debug!(
                        key = %key,
                        subscribers = in_flight.subscribers.len(),
                        "Coalescing request - waiting for outstanding execution"
                    );
                    false
                }
                None => {
                    let mut in_flight = InFlight::new();
                    in_flight.subscribers.insert(id, sender);
                    state.insert(key.clone(), in_flight);
                    debug!(
                        key = %key,
                        in_flight_count = state.len(),
                        "New request - starting execution"
                    );
                    true
                }
            }
        };
        self.shared.stats.record_request(!start);

        if start {
            let shared = Arc::clone(&self.shared);
            let run_key = key.clone();
            tokio::spawn(async move {
                let outcome = shared.execute(&run_key).await;
                shared.deliver(&run_key, outcome);
                shared.prune_gate(&run_key);
            });
        }

        let registry: Arc<dyn Unsubscribe> = self.shared.clone();
        Subscription::new(key, id, receiver, registry)
    }

    /// Drop any cached state the stage chain holds for `key`.
    ///
    /// An outstanding execution for `key` is not affected.
    pub fn invalidate(&self, key: &ResourceKey) {
        debug!(key = %key, "Invalidating");
        self.shared.stage.invalidate(key);
    }

    pub fn stage(&self) -> &Arc<S> {
        &self.shared.stage
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.shared.config
    }

    /// Number of keys with an outstanding execution.
    pub fn in_flight_count(&self) -> usize {
        self.shared.lock_state().len()
    }

    /// Number of subscribers waiting on `key`.
    pub fn subscriber_count(&self, key: &ResourceKey) -> usize {
        self.shared
            .lock_state()
            .get(key)
            .map_or(0, |in_flight| in_flight.subscribers.len())
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.shared.stats.snapshot()
    }

    /// Logs current statistics.
    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            total_requests = stats.total_requests,
            coalesced = stats.coalesced_requests,
            executions = stats.executions,
            attempts = stats.attempts,
            retries = stats.retries,
            timeouts = stats.timeouts,
            successes = stats.successes,
            failures = stats.failures,
            in_flight = self.in_flight_count(),
            coalescing_ratio = format!("{:.1}%", stats.coalescing_ratio() * 100.0),
            "Asset coordinator statistics"
        );
    }
}

impl<S> Shared<S>
where
    S: Stage,
    S::Output: Clone,
{
    fn lock_state(&self) -> MutexGuard<'_, HashMap<ResourceKey, InFlight<S::Output>>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_gates(&self) -> MutexGuard<'_, HashMap<ResourceKey, Arc<AttemptGate<()>>>> {
        self.gates.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn gate(&self, key: &ResourceKey) -> Arc<AttemptGate<()>> {
        let mut gates = self.lock_gates();
        Arc::clone(
            gates
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AttemptGate::new(()))),
        )
    }

    /// Drop the gate for `key` unless an execution or an abandoned attempt
    /// still holds it.
    fn prune_gate(&self, key: &ResourceKey) {
        let mut gates = self.lock_gates();
        if gates.get(key).is_some_and(|gate| Arc::strong_count(gate) == 1) {
            gates.remove(key);
        }
    }

    /// Run the retry loop for `key` until it reaches a terminal outcome.
    #[instrument(level = "debug", skip_all, fields(key = %key))]
    async fn execute(&self, key: &ResourceKey) -> Outcome<S::Output> {
        let max_attempts = self.config.max_attempts();
        let gate = self.gate(key);
        let mut attempt = 0;
        let mut last_error: Option<StageError> = None;

        loop {
            let drain = self.config.drain_timeout();
            let permit = match tokio::time::timeout(drain, Arc::clone(&gate).lock_owned()).await {
                Ok(permit) => permit,
                Err(_) => {
                    let error = last_error
                        .unwrap_or_else(|| StageError::timeout(self.config.attempt_timeout()));
                    self.stats.record_failure();
                    warn!(
                        attempt,
                        drain_ms = drain.as_millis() as u64,
                        "Abandoned attempt still running, giving up"
                    );
                    return Outcome::Failed(FetchError::new(key.clone(), attempt, error));
                }
            };

            attempt += 1;
            let error = match self.attempt(key, permit).await {
                Ok(artifact) => {
                    self.stats.record_success();
                    debug!(attempt, "Execution succeeded");
                    return Outcome::Ready(artifact);
                }
                Err(e) => e,
            };

            if !error.is_retryable() {
                self.stats.record_failure();
                debug!(attempt, error = %error, "Permanent failure");
                return Outcome::Failed(FetchError::new(key.clone(), attempt, error));
            }

            if attempt >= max_attempts {
                self.stats.record_failure();
                warn!(attempt, error = %error, "Retry budget exhausted");
                return Outcome::Failed(FetchError::new(key.clone(), attempt, error));
            }

            let delay = self.config.backoff_for(attempt);
            self.stats.record_retry();
            warn!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retryable failure, retrying"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            last_error = Some(error);
        }
    }

    /// One invocation of the stage chain on the blocking pool.
    ///
    /// The blocking task owns `permit` until the stage chain returns. On
    /// timeout the task is detached and its context abandoned: it runs to
    /// completion on its own, skips side effects, and its result is
    /// discarded.
    async fn attempt(
        &self,
        key: &ResourceKey,
        permit: OwnedMutexGuard<()>,
    ) -> Result<S::Output, StageError> {
        self.stats.record_attempt();

        let stage = Arc::clone(&self.stage);
        let task_key = key.clone();
        let context = RequestContext::new();
        let task_context = context.clone();
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            stage.request(&task_key, &task_context)
        });

        let budget = self.config.attempt_timeout();
        match tokio::time::timeout(budget, task).await {
            Ok(Ok(result)) => result.into_result(),
            Ok(Err(join_error)) => Err(StageError::permanent(
                FailureKind::Internal,
                format!("stage task failed: {}", join_error),
            )),
            Err(_) => {
                context.abandon();
                self.stats.record_timeout();
                Err(StageError::timeout(budget))
            }
        }
    }

    /// Leave the outstanding set and hand `outcome` to every subscriber.
    ///
    /// Removal happens under the state lock, so a concurrent `fetch` either
    /// joined before it (and is delivered to here) or starts a new execution.
    fn deliver(&self, key: &ResourceKey, outcome: Outcome<S::Output>) {
        let Some(in_flight) = self.lock_state().remove(key) else {
            return;
        };

        let mut senders: Vec<_> = in_flight.subscribers.into_values().collect();
        let waiters = senders.len();
        if let Some(last) = senders.pop() {
            for sender in senders {
                let _ = sender.send(outcome.clone());
            }
            let _ = last.send(outcome);
        }

        debug!(key = %key, waiters, "Delivered outcome");
    }
}

impl<S> Unsubscribe for Shared<S>
where
    S: Stage,
    S::Output: Clone,
{
    fn unsubscribe(&self, key: &ResourceKey, id: u64) {
        let mut state = self.lock_state();
        if let Some(in_flight) = state.get_mut(key) {
            if in_flight.subscribers.remove(&id).is_some() && in_flight.subscribers.is_empty() {
                debug!(key = %key, "Last subscriber left, execution continues unobserved");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StageResult;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Condvar;
    use std::time::Duration;

    fn fast_config() -> CoordinatorConfig {
        CoordinatorConfig::new()
            .with_attempt_timeout(Duration::from_secs(5))
            .with_retry_backoff(Duration::ZERO)
    }

    /// Blocks every request until `open` is called.
    #[derive(Default)]
    struct Gated {
        open: Mutex<bool>,
        cond: Condvar,
        calls: AtomicUsize,
    }

    impl Gated {
        fn open(&self) {
            *self.open.lock().unwrap() = true;
            self.cond.notify_all();
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Stage for Gated {
        type Output = usize;

        fn request(&self, key: &ResourceKey, _ctx: &RequestContext) -> StageResult<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.cond.wait(open).unwrap();
            }
            StageResult::Success(key.as_str().len())
        }
    }

    /// Fails every request with a fixed error.
    struct Failing {
        error: StageError,
        calls: AtomicUsize,
    }

    impl Failing {
        fn new(error: StageError) -> Self {
            Self {
                error,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Stage for Failing {
        type Output = usize;

        fn request(&self, _key: &ResourceKey, _ctx: &RequestContext) -> StageResult<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            StageResult::Failed(self.error.clone())
        }
    }

    /// Sleeps longer than any sensible timeout, then fails.
    struct Hanging {
        delay: Duration,
        calls: AtomicUsize,
    }

    impl Stage for Hanging {
        type Output = usize;

        fn request(&self, _key: &ResourceKey, _ctx: &RequestContext) -> StageResult<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            StageResult::Failed(StageError::retryable(FailureKind::Transport, "hung"))
        }
    }

    async fn wait_until_idle<S>(coordinator: &AssetCoordinator<S>)
    where
        S: Stage,
        S::Output: Clone,
    {
        for _ in 0..200 {
            if coordinator.in_flight_count() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("coordinator never became idle");
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_execution() {
        let coordinator = AssetCoordinator::new(Gated::default(), fast_config());
        let key = ResourceKey::from("img://a");

        let subs: Vec<_> = (0..5).map(|_| coordinator.fetch(key.clone())).collect();
        assert_eq!(coordinator.in_flight_count(), 1);
        assert_eq!(coordinator.subscriber_count(&key), 5);

        coordinator.stage().open();
        for sub in subs {
            assert_eq!(sub.await, Outcome::Ready(7));
        }

        assert_eq!(coordinator.stage().calls(), 1);
        let stats = coordinator.stats();
        assert_eq!(stats.total_requests, 5);
        assert_eq!(stats.coalesced_requests, 4);
        assert_eq!(stats.executions, 1);
        assert_eq!(coordinator.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_different_keys_execute_independently() {
        let stage = Gated::default();
        stage.open();
        let coordinator = AssetCoordinator::new(stage, fast_config());

        let a = coordinator.fetch("img://a");
        let bb = coordinator.fetch("img://bb");

        assert_eq!(a.await, Outcome::Ready(7));
        assert_eq!(bb.await, Outcome::Ready(8));
        assert_eq!(coordinator.stage().calls(), 2);
    }

    #[tokio::test]
    async fn test_retryable_failure_exhausts_attempt_budget() {
        let coordinator = AssetCoordinator::new(
            Failing::new(StageError::retryable(FailureKind::Http { status: 503 }, "busy")),
            fast_config(),
        );

        let first = coordinator.fetch("img://a");
        let second = coordinator.fetch("img://a");

        let err = first.await.into_result().unwrap_err();
        assert_eq!(err.attempts(), 3);
        assert!(!err.is_retryable());
        assert_eq!(err.cause().kind(), FailureKind::Http { status: 503 });
        assert_eq!(second.await.into_result().unwrap_err(), err);

        assert_eq!(coordinator.stage().calls.load(Ordering::SeqCst), 3);
        let stats = coordinator.stats();
        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.retries, 2);
        assert_eq!(stats.failures, 1);
    }

    #[tokio::test]
    async fn test_permanent_failure_short_circuits() {
        let coordinator = AssetCoordinator::new(
            Failing::new(StageError::permanent(FailureKind::Http { status: 404 }, "missing")),
            fast_config(),
        );

        let err = coordinator.fetch("img://a").await.into_result().unwrap_err();

        assert_eq!(err.attempts(), 1);
        assert_eq!(coordinator.stage().calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.stats().retries, 0);
    }

    #[tokio::test]
    async fn test_hung_attempts_time_out_and_are_retried() {
        let coordinator = AssetCoordinator::new(
            Hanging {
                delay: Duration::from_millis(100),
                calls: AtomicUsize::new(0),
            },
            fast_config().with_attempt_timeout(Duration::from_millis(10)),
        );

        let err = coordinator.fetch("img://a").await.into_result().unwrap_err();

        assert_eq!(err.attempts(), 3);
        assert_eq!(err.cause().kind(), FailureKind::Timeout);
        let stats = coordinator.stats();
        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.timeouts, 3);
    }

    #[tokio::test]
    async fn test_gives_up_when_abandoned_attempt_outlives_drain_timeout() {
        let coordinator = AssetCoordinator::new(
            Hanging {
                delay: Duration::from_millis(300),
                calls: AtomicUsize::new(0),
            },
            fast_config()
                .with_attempt_timeout(Duration::from_millis(10))
                .with_drain_timeout(Duration::from_millis(20)),
        );

        let err = coordinator.fetch("img://a").await.into_result().unwrap_err();
        assert_eq!(err.attempts(), 1);
        assert_eq!(err.cause().kind(), FailureKind::Timeout);

        // The abandoned attempt still holds the key, so a new execution
        // does not start a second invocation alongside it.
        let again = coordinator.fetch("img://a").await.into_result().unwrap_err();
        assert_eq!(again.attempts(), 0);
        assert_eq!(again.cause().kind(), FailureKind::Timeout);

        assert_eq!(coordinator.stage().calls.load(Ordering::SeqCst), 1);
        let stats = coordinator.stats();
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats.failures, 2);
    }

    #[tokio::test]
    async fn test_subscriber_after_delivery_starts_fresh_execution() {
        let stage = Gated::default();
        stage.open();
        let coordinator = AssetCoordinator::new(stage, fast_config());

        assert!(coordinator.fetch("img://a").await.is_ready());
        assert!(coordinator.fetch("img://a").await.is_ready());

        assert_eq!(coordinator.stage().calls(), 2);
        assert_eq!(coordinator.stats().executions, 2);
    }

    #[tokio::test]
    async fn test_cancel_removes_only_that_subscriber() {
        let coordinator = AssetCoordinator::new(Gated::default(), fast_config());
        let key = ResourceKey::from("img://a");

        let kept = coordinator.fetch(key.clone());
        let cancelled = coordinator.fetch(key.clone());
        assert_eq!(coordinator.subscriber_count(&key), 2);

        cancelled.cancel();
        assert_eq!(coordinator.subscriber_count(&key), 1);

        coordinator.stage().open();
        assert_eq!(kept.await, Outcome::Ready(7));
        assert_eq!(coordinator.stage().calls(), 1);
    }

    #[tokio::test]
    async fn test_execution_completes_without_subscribers() {
        let coordinator = AssetCoordinator::new(Gated::default(), fast_config());

        drop(coordinator.fetch("img://a"));
        assert_eq!(coordinator.in_flight_count(), 1);

        coordinator.stage().open();
        wait_until_idle(&coordinator).await;

        assert_eq!(coordinator.stage().calls(), 1);
        assert_eq!(coordinator.stats().successes, 1);
    }

    #[tokio::test]
    async fn test_invalidate_reaches_stage() {
        #[derive(Default)]
        struct Tracking(Mutex<Vec<ResourceKey>>);

        impl Stage for Tracking {
            type Output = ();

            fn request(&self, _key: &ResourceKey, _ctx: &RequestContext) -> StageResult<()> {
                StageResult::Success(())
            }

            fn invalidate(&self, key: &ResourceKey) {
                self.0.lock().unwrap().push(key.clone());
            }
        }

        let coordinator = AssetCoordinator::new(Tracking::default(), fast_config());
        coordinator.invalidate(&ResourceKey::from("img://a"));

        assert_eq!(
            *coordinator.stage().0.lock().unwrap(),
            vec![ResourceKey::from("img://a")]
        );
    }
}
