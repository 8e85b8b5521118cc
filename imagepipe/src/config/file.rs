//! Configuration file handling for ~/.imagepipe/config.ini.
//!
//! A missing file means defaults. Parsing lives in [`super::parser`],
//! serialization in [`super::writer`].

use crate::cache::CacheBudget;
use crate::coordinator::CoordinatorConfig;
use crate::decode::ImageDecoder;
use ini::Ini;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::transport::TransportConfig;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read or parse the config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write the config file
    #[error("Failed to write config file: {0}")]
    WriteError(#[source] std::io::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create the config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(#[source] std::io::Error),
}

/// Everything needed to assemble an [`ImagePipeline`](crate::service::ImagePipeline).
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    /// `[cache]` memory budget
    pub cache: CacheBudget,
    /// `[coordinator]` retry and timeout policy
    pub coordinator: CoordinatorConfig,
    /// `[transport]` HTTP client settings
    pub transport: TransportConfig,
    /// `[decode]` decoder limits
    pub decoder: ImageDecoder,
}

impl ConfigFile {
    /// Load configuration from the default path (~/.imagepipe/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to the default path (~/.imagepipe/config.ini).
    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    /// Save configuration to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        std::fs::write(path, super::writer::to_config_string(self))
            .map_err(ConfigFileError::WriteError)
    }

    /// Render the configuration as it would be written to disk.
    pub fn to_ini_string(&self) -> String {
        super::writer::to_config_string(self)
    }
}

/// Get the path to the config directory (~/.imagepipe).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".imagepipe")
}

/// Get the path to the config file (~/.imagepipe/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
