//! imagepipe - deduplicating, retrying image fetch pipeline
//!
//! Turns a chain of small synchronous stages (fetch, decode, memory cache,
//! warm) into an asynchronous service: concurrent requests for the same
//! key share one execution, transient failures are retried, and every
//! subscriber receives exactly one outcome.
//!
//! # High-Level API
//!
//! ```ignore
//! use imagepipe::config::ConfigFile;
//! use imagepipe::service::ImagePipeline;
//!
//! let pipeline = ImagePipeline::new(&ConfigFile::load()?)?;
//!
//! // Both subscriptions are answered by a single download.
//! let a = pipeline.fetch("https://cdn.example.com/avatar.png");
//! let b = pipeline.fetch("https://cdn.example.com/avatar.png");
//! let (a, b) = futures::join!(a, b);
//! ```
//!
//! # Building Blocks
//!
//! - [`pipeline`]: the [`Stage`](pipeline::Stage) contract and concrete stages
//! - [`coordinator`]: deduplication, timeout, retry and fan-out
//! - [`cache`]: byte-budget LRU memory cache
//! - [`transport`], [`decode`], [`warm`]: the collaborators stages delegate to

pub mod artifact;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod decode;
pub mod key;
pub mod logging;
pub mod pipeline;
pub mod service;
pub mod system;
pub mod transport;
pub mod warm;

pub use artifact::{Artifact, Bitmap};
pub use coordinator::{AssetCoordinator, FetchError, Outcome, Subscription};
pub use key::ResourceKey;
pub use service::ImagePipeline;

/// Version of the imagepipe library and CLI.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
