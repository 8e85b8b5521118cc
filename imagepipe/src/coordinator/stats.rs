//! Coordinator statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of coordinator activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Total `fetch` calls
    pub total_requests: u64,
    /// Requests that joined an outstanding execution
    pub coalesced_requests: u64,
    /// Executions started (one per Idle -> Outstanding transition)
    pub executions: u64,
    /// Stage chain invocations across all executions
    pub attempts: u64,
    /// Attempts that followed a retryable failure
    pub retries: u64,
    /// Attempts abandoned after exceeding the timeout
    pub timeouts: u64,
    /// Executions that delivered an artifact
    pub successes: u64,
    /// Executions that delivered a terminal failure
    pub failures: u64,
}

impl CoordinatorStats {
    /// Returns the coalescing ratio (0.0 to 1.0)
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    total_requests: AtomicU64,
    coalesced_requests: AtomicU64,
    executions: AtomicU64,
    attempts: AtomicU64,
    retries: AtomicU64,
    timeouts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_request(&self, coalesced: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if coalesced {
            self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.executions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CoordinatorStats {
        CoordinatorStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            executions: self.executions.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}
