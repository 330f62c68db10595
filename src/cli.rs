use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "genai-facts", version, about = "GenAI fun facts service")]
pub struct Cli {
    /// Configuration file path (defaults to an optional ./config.{toml,yaml,json})
    #[arg(short, long, global = true, env = "GENAI_FACTS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the facts server (default)
    Start,

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Display the effective configuration (with secrets masked)
    Show,
    /// Validate the configuration
    Validate,
}

impl Cli {
    /// Get the command to execute, defaulting to Start
    pub fn get_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_start() {
        let cli = Cli::parse_from(["genai-facts"]);
        assert!(matches!(cli.get_command(), Commands::Start));
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_config_show_with_global_flag() {
        let cli = Cli::parse_from(["genai-facts", "config", "show", "--config", "facts.toml"]);
        assert!(matches!(
            cli.get_command(),
            Commands::Config {
                action: ConfigCommands::Show
            }
        ));
        assert_eq!(cli.config, Some(PathBuf::from("facts.toml")));
    }
}
