//! Configuration CLI commands.
//!
//! Provides `config show`, `config defaults` and `config path` for inspecting
//! the settings the engine would run with.

use std::path::PathBuf;

use clap::Subcommand;
use lazyload::config::LazyConfig;

use super::{config_file_path, load_config};
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as INI
    Show {
        /// Configuration file (default: the per-user config file, if present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the built-in defaults as INI
    Defaults,

    /// Show the default configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show { config } => {
            let config = load_config(config.as_ref())?;
            print!("{}", config.to_ini_string()?);
        }
        ConfigCommands::Defaults => {
            print!("{}", LazyConfig::default().to_ini_string()?);
        }
        ConfigCommands::Path => {
            println!("{}", config_file_path()?.display());
        }
    }
    Ok(())
}
