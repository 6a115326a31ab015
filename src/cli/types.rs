//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "opsguard")]
#[command(about = "opsguard - locks, circuit breakers, retries and caching for ops automation", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .opsguard/
    #[arg(short, long, global = true, env = "OPSGUARD_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect and validate configuration
    Config(ConfigArgs),

    /// Run a reference scenario against the in-memory backends
    Scenario(ScenarioArgs),
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Load and validate configuration
    Validate,
}

#[derive(Args, Debug)]
pub struct ScenarioArgs {
    #[command(subcommand)]
    pub scenario: ScenarioCommands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioCommands {
    /// Two instances contend for one lock
    Lock,

    /// Breaker opens after three failures and recovers through a probe
    Breaker,

    /// Tier-1 eviction and re-promotion from tier 2
    Cache,

    /// Always-failing call with two retries
    Retry,
}

impl ScenarioCommands {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Breaker => "breaker",
            Self::Cache => "cache",
            Self::Retry => "retry",
        }
    }
}
