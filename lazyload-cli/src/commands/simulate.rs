//! `simulate` command: replay a scroll scenario and print the report.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use lazyload::Mode;

use super::load_config;
use crate::error::CliError;
use crate::scenario::{self, Scenario};

/// Visibility backend selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum ModeArg {
    /// Throttled polling on scroll events
    Polling,
    /// Native intersection callbacks (falls back to polling when unavailable)
    Observer,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Polling => Mode::Polling,
            ModeArg::Observer => Mode::Observer,
        }
    }
}

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Scenario file (JSON)
    pub scenario: PathBuf,

    /// Configuration file (default: the per-user config file, if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the configured visibility backend
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Print single-line JSON
    #[arg(long)]
    pub compact: bool,
}

pub fn run(args: SimulateArgs) -> Result<(), CliError> {
    let contents =
        std::fs::read_to_string(&args.scenario).map_err(|source| CliError::ScenarioRead {
            path: args.scenario.clone(),
            source,
        })?;
    let scenario: Scenario = serde_json::from_str(&contents)?;

    let mut config = load_config(args.config.as_ref())?;
    if let Some(mode) = args.mode {
        config.mode = mode.into();
    }

    tracing::info!(
        scenario = %args.scenario.display(),
        elements = scenario.elements.len(),
        steps = scenario.steps.len(),
        mode = %config.mode,
        "Running scenario"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let outcome = runtime.block_on(scenario::run(&scenario, config))?;

    let json = if args.compact {
        serde_json::to_string(&outcome)?
    } else {
        serde_json::to_string_pretty(&outcome)?
    };
    println!("{}", json);
    Ok(())
}
