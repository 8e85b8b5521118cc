//! CLI error handling with user-friendly messages.

use imagepipe::config::ConfigFileError;
use imagepipe::service::ServiceError;
use std::fmt;
use std::path::PathBuf;
use std::process;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(std::io::Error),
    /// Configuration could not be loaded or saved
    Config(ConfigFileError),
    /// Refused to overwrite an existing configuration file
    ConfigExists(PathBuf),
    /// Failed to assemble the pipeline
    ServiceCreation(ServiceError),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// Some fetches ended in failure
    FetchFailed { failed: usize, total: usize },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Config(ConfigFileError::InvalidValue { .. }) => {
                eprintln!();
                eprintln!("Run 'imagepipe config show' to see the effective settings,");
                eprintln!("or 'imagepipe config init --force' to reset the file to defaults.");
            }
            CliError::ConfigExists(_) => {
                eprintln!();
                eprintln!("Use --force to overwrite it with defaults.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Config(e) => write!(f, "{}", e),
            CliError::ConfigExists(path) => {
                write!(f, "Configuration file already exists: {}", path.display())
            }
            CliError::ServiceCreation(e) => write!(f, "Failed to create pipeline: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::FetchFailed { failed, total } => {
                write!(f, "{} of {} URL(s) failed", failed, total)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) => Some(e),
            CliError::Config(e) => Some(e),
            CliError::ServiceCreation(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}
