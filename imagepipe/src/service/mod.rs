//! The assembled image pipeline.
//!
//! Wires the standard stage chain to a coordinator:
//!
//! ```text
//! ImagePipeline::fetch(url)
//!   └─► AssetCoordinator
//!         └─► WarmStage
//!               └─► MemoryCacheStage ──► MemoryCache (shared handle)
//!                     └─► DecodeStage ──► ImageDecoder
//!                           └─► FetchStage ──► ReqwestTransport
//! ```

mod error;
mod pipeline;

pub use error::ServiceError;
pub use pipeline::{ImagePipeline, StandardStage};
