use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tandem")]
#[command(about = "Tandem - pairs waiting participants by the similarity of their interests")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the matchmaking service
    Start {
        /// Path to the configuration file
        #[arg(short, long, env = "TANDEM_CONFIG", default_value = "tandem.yaml")]
        config: PathBuf,

        /// Override the listen host
        #[arg(long)]
        host: Option<String>,

        /// Override the HTTP port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate configuration without starting the service
    Validate {
        #[arg(short, long, env = "TANDEM_CONFIG", default_value = "tandem.yaml")]
        config: PathBuf,
    },

    /// Write a configuration file with all defaults
    Init {
        #[arg(short, long, default_value = "tandem.yaml")]
        output: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_overrides() {
        let cli = Cli::parse_from(["tandem", "start", "-c", "prod.yaml", "--port", "8080"]);
        match cli.command {
            Commands::Start { config, host, port } => {
                assert_eq!(config, PathBuf::from("prod.yaml"));
                assert_eq!(host, None);
                assert_eq!(port, Some(8080));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_init_default_output() {
        let cli = Cli::parse_from(["tandem", "init"]);
        assert!(matches!(
            cli.command,
            Commands::Init { output } if output == PathBuf::from("tandem.yaml")
        ));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
