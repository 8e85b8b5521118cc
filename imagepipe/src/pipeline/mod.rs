//! Composable synchronous stages that turn a key into an artifact.
//!
//! The standard chain, outermost first:
//!
//! ```text
//! WarmStage -> MemoryCacheStage -> DecodeStage -> FetchStage -> Transport
//! ```
//!
//! Each stage owns the stage it wraps. Failures are classified once, where
//! they originate, and flow outward unchanged.

mod context;
mod error;
mod stage;
pub mod stages;

pub use context::RequestContext;
pub use error::{FailureKind, StageError};
pub use stage::{Stage, StageResult};
pub use stages::{DecodeStage, FetchStage, MemoryCacheStage, WarmStage};
