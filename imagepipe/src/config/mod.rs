//! Configuration for the image pipeline.
//!
//! Settings are grouped per component ([`CacheBudget`](crate::cache::CacheBudget),
//! [`CoordinatorConfig`](crate::coordinator::CoordinatorConfig),
//! [`TransportConfig`]) and persisted together as an INI file.
//!
//! # Example
//!
//! ```
//! use imagepipe::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! assert_eq!(config.coordinator.max_attempts(), 3);
//! assert!(config.to_ini_string().contains("[coordinator]"));
//! ```

mod file;
mod parser;
mod size;
mod transport;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFile, ConfigFileError};
pub use size::{format_size, parse_size, Size, SizeParseError};
pub use transport::{default_user_agent, TransportConfig, DEFAULT_REQUEST_TIMEOUT_SECS};
