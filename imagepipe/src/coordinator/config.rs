//! Coordinator retry and timeout configuration.

use std::time::Duration;

/// Default budget for a single pipeline attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of attempts per execution (first try included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay between retryable attempts: retry immediately.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::ZERO;

/// Default wait for an abandoned attempt to finish before the next one starts.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on the backoff exponent.
const MAX_BACKOFF_SHIFT: u32 = 16;

/// Retry and timeout policy for the [`AssetCoordinator`](super::AssetCoordinator).
///
/// Per key at most one attempt runs at a time, abandoned ones included:
/// after a timeout the next attempt waits up to `drain_timeout` for the
/// abandoned one to return. Backoff between retries and the drain wait
/// are extensions to the timeout/attempts policy; backoff is off unless
/// configured.
///
/// # Example
///
/// ```
/// use imagepipe::coordinator::CoordinatorConfig;
/// use std::time::Duration;
///
/// let config = CoordinatorConfig::default();
/// assert_eq!(config.attempt_timeout(), Duration::from_secs(10));
/// assert_eq!(config.max_attempts(), 3);
///
/// let config = CoordinatorConfig::new()
///     .with_attempt_timeout(Duration::from_secs(2))
///     .with_max_attempts(5)
///     .with_retry_backoff(Duration::ZERO);
/// assert_eq!(config.backoff_for(3), Duration::ZERO);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Time budget for one invocation of the stage chain
    attempt_timeout: Duration,
    /// Total attempts before a retryable failure becomes terminal
    max_attempts: u32,
    /// Base delay, doubled after every retryable failure
    retry_backoff: Duration,
    /// Wait for an abandoned attempt before starting the next one
    drain_timeout: Duration,
}

impl CoordinatorConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-attempt timeout.
    ///
    /// An attempt that exceeds it is abandoned and counted as a retryable
    /// failure. Default: 10 seconds.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Set the maximum number of attempts, clamped to at least 1.
    ///
    /// Default: 3 attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the base retry delay. `Duration::ZERO` retries immediately.
    ///
    /// Default: zero.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Set how long a new attempt waits for an abandoned attempt on the
    /// same key to return.
    ///
    /// If the abandoned attempt is still running when this elapses, the
    /// execution ends with its last failure rather than overlap it.
    /// Default: 30 seconds.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn retry_backoff(&self) -> Duration {
        self.retry_backoff
    }

    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    /// Delay to wait after the given failed attempt (1-based).
    ///
    /// Exponential: `base * 2^(attempt - 1)`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        self.retry_backoff.saturating_mul(1 << shift)
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.attempt_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_attempts(), 3);
        assert_eq!(config.retry_backoff(), Duration::ZERO);
        assert_eq!(config.backoff_for(2), Duration::ZERO);
        assert_eq!(config.drain_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_max_attempts_never_zero() {
        assert_eq!(CoordinatorConfig::new().with_max_attempts(0).max_attempts(), 1);
    }

    #[test]
    fn test_backoff_doubles() {
        let config = CoordinatorConfig::new().with_retry_backoff(Duration::from_millis(100));
        assert_eq!(config.backoff_for(1), Duration::from_millis(100));
        assert_eq!(config.backoff_for(2), Duration::from_millis(200));
        assert_eq!(config.backoff_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_is_bounded() {
        let config = CoordinatorConfig::new().with_retry_backoff(Duration::from_secs(1));
        assert_eq!(config.backoff_for(u32::MAX), config.backoff_for(MAX_BACKOFF_SHIFT + 1));
    }
}
