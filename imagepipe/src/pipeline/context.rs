//! Per-attempt request context passed down the stage chain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// State shared between the coordinator and one attempt running a stage chain.
///
/// The coordinator marks the context abandoned when the attempt outlives
/// its time budget. The blocking work cannot be interrupted, but stages
/// check the flag before producing side effects: an abandoned attempt must
/// not populate caches after its outcome has already been decided.
///
/// Cloning is cheap and clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    abandoned: Arc<AtomicBool>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the attempt as abandoned. Irreversible.
    pub fn abandon(&self) {
        self.abandoned.store(true, Ordering::Release);
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::Acquire)
    }
}
