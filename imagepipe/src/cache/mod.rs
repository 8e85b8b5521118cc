//! Memory cache for decoded artifacts.
//!
//! Provides a byte-budget LRU cache, its budget policy and statistics.
//! The pipeline stage that puts the cache in front of the decoder lives in
//! [`crate::pipeline::stages`].

mod budget;
mod memory;
mod stats;

pub use budget::{CacheBudget, DEFAULT_MEMORY_FRACTION};
pub use memory::{EvictionListener, InsertOutcome, MemoryCache};
pub use stats::CacheStats;
