//! Configuration management CLI commands.

use clap::Subcommand;
use imagepipe::config::{config_file_path, ConfigFile};
use std::path::{Path, PathBuf};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show {
        /// Configuration file (default: ~/.imagepipe/config.ini)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Write a configuration file with default values
    Init {
        /// Configuration file (default: ~/.imagepipe/config.ini)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show { config } => run_show(config.as_deref()),
        ConfigCommands::Init { config, force } => run_init(config, force),
        ConfigCommands::Path => {
            println!("{}", config_file_path().display());
            Ok(())
        }
    }
}

/// Load the configuration from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    match path {
        Some(path) => ConfigFile::load_from(path),
        None => ConfigFile::load(),
    }
    .map_err(CliError::Config)
}

fn run_show(path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(path)?;
    let source = path.map(Path::to_path_buf).unwrap_or_else(config_file_path);

    println!("; Source: {}", source.display());
    println!("; Effective cache budget: {}", config.cache);
    println!();
    print!("{}", config.to_ini_string());
    Ok(())
}

fn run_init(path: Option<PathBuf>, force: bool) -> Result<(), CliError> {
    let path = path.unwrap_or_else(config_file_path);
    if path.exists() && !force {
        return Err(CliError::ConfigExists(path));
    }

    ConfigFile::default()
        .save_to(&path)
        .map_err(CliError::Config)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[cache]\nmemory_size = 1GB\n").unwrap();

        let result = run_init(Some(path.clone()), false);

        assert!(matches!(result, Err(CliError::ConfigExists(_))));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "[cache]\nmemory_size = 1GB\n"
        );
    }

    #[test]
    fn test_init_then_load() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("sub").join("config.ini");

        run_init(Some(path.clone()), false).unwrap();
        let config = load_config(Some(&path)).unwrap();

        assert_eq!(config.coordinator.max_attempts(), 3);
    }
}
