//! CLI command implementations.
//!
//! - [`fetch`] - Fetch images through the pipeline
//! - [`config`] - Configuration management (show, init, path)

pub mod config;
pub mod fetch;
