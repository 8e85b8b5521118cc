//! imagepipe CLI - Command-line interface
//!
//! Fetches images through the deduplicating pipeline and manages the
//! configuration file.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use commands::config::ConfigCommands;
use commands::fetch::FetchArgs;

#[derive(Parser)]
#[command(name = "imagepipe")]
#[command(version = imagepipe::VERSION)]
#[command(about = "Deduplicating, retrying image fetch pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one or more images and report what each subscriber received
    Fetch(FetchArgs),

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fetch(args) => commands::fetch::run(args),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_parses_overrides() {
        let cli = Cli::try_parse_from([
            "imagepipe",
            "fetch",
            "https://cdn.example.com/a.png",
            "https://cdn.example.com/b.png",
            "--repeat",
            "4",
            "--cache-size",
            "64MB",
            "--max-attempts",
            "2",
        ])
        .unwrap();

        match cli.command {
            Commands::Fetch(args) => {
                assert_eq!(args.urls.len(), 2);
                assert_eq!(args.repeat, 4);
                assert_eq!(args.cache_size.map(|s| s.bytes()), Some(64 * 1024 * 1024));
                assert_eq!(args.max_attempts, Some(2));
                assert_eq!(args.timeout_ms, None);
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn test_fetch_requires_a_url() {
        assert!(Cli::try_parse_from(["imagepipe", "fetch"]).is_err());
    }

    #[test]
    fn test_zero_repeat_is_rejected() {
        assert!(
            Cli::try_parse_from(["imagepipe", "fetch", "https://a/b.png", "--repeat", "0"])
                .is_err()
        );
    }

    #[test]
    fn test_config_init_force() {
        let cli = Cli::try_parse_from(["imagepipe", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Init { force: true, .. }
            }
        ));
    }
}
