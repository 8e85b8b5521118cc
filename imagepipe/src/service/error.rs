//! Service error types.

use crate::config::ConfigFileError;
use crate::transport::TransportError;
use thiserror::Error;

/// Errors raised while assembling an [`ImagePipeline`](super::ImagePipeline).
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Transport(#[from] TransportError),

    /// The configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigFileError),
}
