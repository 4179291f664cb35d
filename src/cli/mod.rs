pub mod commands;
pub mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use crate::utils::default_log_file;

#[derive(Parser)]
#[command(name = "carlot", author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to the per-user config location)
    #[arg(short, long, global = true, env = "CARLOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log debug events of the crawler
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to a file; without a value the default location is used
    #[arg(long, global = true, require_equals = true, value_name = "PATH")]
    pub log_file: Option<Option<PathBuf>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Crawl the listings forever, sleeping between runs
    Run,

    /// Crawl the listings once and exit
    Once,

    /// Show the effective configuration
    Config {
        /// Write the built-in defaults to the default config location
        #[arg(long)]
        init: bool,
    },
}

impl Cli {
    /// Log file requested on the command line, if any
    pub fn log_path(&self) -> Option<PathBuf> {
        match &self.log_file {
            Some(Some(path)) => Some(path.clone()),
            Some(None) => Some(default_log_file()),
            None => None,
        }
    }
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Process the command
pub async fn process_command(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run => {
            info!("Starting scheduled crawling");
            commands::run(config_path).await
        },
        Commands::Once => {
            info!("Starting a single crawl run");
            commands::once(config_path).await
        },
        Commands::Config { init } => {
            if init {
                info!("Writing default configuration");
                commands::init_config()
            } else {
                commands::show_config(config_path)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert()
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["carlot", "once", "--verbose", "--config", "/etc/carlot.yaml"]).unwrap();

        assert_eq!(cli.command, Commands::Once);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/carlot.yaml")));
        assert_eq!(cli.log_path(), None);
    }

    #[test]
    fn test_log_file_value_is_optional() {
        let cli = Cli::try_parse_from(["carlot", "--log-file", "run"]).unwrap();
        assert_eq!(cli.command, Commands::Run);
        assert_eq!(cli.log_path(), Some(default_log_file()));

        let cli = Cli::try_parse_from(["carlot", "--log-file=/tmp/carlot.log", "run"]).unwrap();
        assert_eq!(cli.log_path(), Some(PathBuf::from("/tmp/carlot.log")));
    }

    #[test]
    fn test_config_init_flag() {
        let cli = Cli::try_parse_from(["carlot", "config", "--init"]).unwrap();
        assert_eq!(cli.command, Commands::Config { init: true });
    }
}
