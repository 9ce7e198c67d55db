//! Train Disruption Advisor CLI
//!
//! A command-line tool for running predictions locally, inspecting model
//! bundles and debugging feature encoding.

mod commands;
mod config;
mod output;

use advisor_lib::LoadConfig;
use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{models, predict};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Train Disruption Advisor CLI
#[derive(Parser)]
#[command(name = "tadv")]
#[command(author, version, about = "CLI for the Train Disruption Advisor", long_about = None)]
pub struct Cli {
    /// Model bundle directory (can also be set via TADV_MODELS_DIR env var)
    #[arg(long, env = "TADV_MODELS_DIR")]
    pub models_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    /// Load models even if their checksums do not match the manifest
    #[arg(long)]
    pub skip_checksums: bool,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict delay, disruption and occupancy for one train
    Predict {
        /// Observation JSON file (reads stdin if omitted)
        #[arg(long, short)]
        input: Option<PathBuf>,
    },

    /// Show the model bundle and the load status of each model
    Models,

    /// Show the encoded feature vector for an observation
    Features {
        /// Observation JSON file (reads stdin if omitted)
        #[arg(long, short)]
        input: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = config::Config::load()?;
    let models_dir = settings.resolve_models_dir(cli.models_dir)?;
    let format = cli.format.unwrap_or_else(|| settings.default_format());
    let load_config = LoadConfig {
        verify_checksums: !cli.skip_checksums,
        ..Default::default()
    };

    match cli.command {
        Commands::Predict { input } => {
            predict::run_prediction(&models_dir, &load_config, input.as_deref(), format)?;
        }
        Commands::Models => {
            models::show_models(&models_dir, &load_config, format)?;
        }
        Commands::Features { input } => {
            predict::show_features(&models_dir, &load_config, input.as_deref(), format)?;
        }
    }

    Ok(())
}
