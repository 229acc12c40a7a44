//! Command-line interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Streaming chat relay for LLM APIs", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Extra TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the prompt that would be sent for a message
    Prompt {
        /// New user message
        message: String,

        /// JSON file holding prior turns
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Version information
    Version,
}

impl Cli {
    /// Subcommand to run; `serve` when none was given.
    pub fn into_command(self) -> Commands {
        self.command.unwrap_or(Commands::Serve {
            host: None,
            port: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_is_default() {
        let cli = Cli::try_parse_from(["parley"]).unwrap();
        assert!(matches!(
            cli.into_command(),
            Commands::Serve {
                host: None,
                port: None
            }
        ));
    }

    #[test]
    fn test_serve_overrides() {
        let cli =
            Cli::try_parse_from(["parley", "serve", "--host", "0.0.0.0", "-p", "8080"]).unwrap();
        match cli.into_command() {
            Commands::Serve { host, port } => {
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
                assert_eq!(port, Some(8080));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_prompt_with_history() {
        let cli = Cli::try_parse_from([
            "parley",
            "prompt",
            "Oi",
            "--history",
            "turns.json",
            "--config",
            "dev.toml",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("dev.toml")));
        match cli.into_command() {
            Commands::Prompt { message, history } => {
                assert_eq!(message, "Oi");
                assert_eq!(history, Some(PathBuf::from("turns.json")));
            }
            _ => panic!("expected prompt"),
        }
    }
}
