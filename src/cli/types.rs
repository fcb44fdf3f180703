//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::{eval::EvalArgs, health::HealthArgs, run::RunArgs};
use crate::domain::models::Config;

#[derive(Parser)]
#[command(name = "clinrefine")]
#[command(about = "Iterative prompt optimizer for a clinical diagnosis service", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to ./clinrefine.yaml when present)
    #[arg(short, long, global = true, env = "CLINREFINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the evaluate / analyze / refine loop
    Run(RunArgs),

    /// Evaluate the current prompts once without refining them
    Eval(EvalArgs),

    /// Check that the diagnosis service is up
    Health(HealthArgs),
}

impl Commands {
    /// Fold this subcommand's flags into the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        match self {
            Self::Run(args) => args.apply(config),
            Self::Eval(args) => args.overrides.apply(config),
            Self::Health(args) => args.apply(config),
        }
    }
}
