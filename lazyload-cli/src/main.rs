//! LazyLoad CLI - Command-line interface
//!
//! Replays scroll scenarios against the lazyload scheduling engine and
//! inspects engine configuration.

mod commands;
mod error;
mod scenario;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use lazyload::logging::{init_logging, LoggingConfig};

use commands::config::ConfigCommands;
use commands::simulate::SimulateArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "lazyload", version = lazyload::VERSION)]
#[command(about = "Replay scroll scenarios against the lazyload engine", long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. "lazyload=debug")
    #[arg(long, global = true, default_value = lazyload::logging::DEFAULT_LOG_FILTER)]
    log_level: String,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a JSON scroll scenario and print the performance report
    Simulate(SimulateArgs),

    /// Inspect engine configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::default().with_default_filter(&cli.log_level);
    if let Some(path) = &cli.log_file {
        logging = logging.with_log_file(path);
    }
    let _guard = init_logging(&logging)?;

    match cli.command {
        Commands::Simulate(args) => commands::simulate::run(args),
        Commands::Config { command } => commands::config::run(command),
    }
}
