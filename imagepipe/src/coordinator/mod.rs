//! Asset coordinator: deduplication, retry and fan-out.
//!
//! The coordinator owns the only piece of shared mutable state outside the
//! cache: the set of keys with an outstanding execution and, per key, the
//! subscribers waiting on it. Both live behind one lock so that joining an
//! execution and leaving the outstanding set are atomic with respect to
//! each other.

mod config;
mod executor;
mod outcome;
mod stats;
mod subscription;

pub use config::{
    CoordinatorConfig, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_DRAIN_TIMEOUT, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_RETRY_BACKOFF,
};
pub use executor::AssetCoordinator;
pub use outcome::{FetchError, Outcome};
pub use stats::CoordinatorStats;
pub use subscription::Subscription;
