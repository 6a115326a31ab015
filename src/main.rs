//! opsguard CLI entry point.

use anyhow::Result;
use clap::Parser;

use opsguard::cli::commands::{config, scenario};
use opsguard::cli::{Cli, Commands};
use opsguard::infrastructure::LoggerImpl;

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    let loaded = config::load_config(config_path)?;
    let _logger = LoggerImpl::init(&loaded.logging)?;

    match cli.command {
        Commands::Config(args) => config::execute(args, loaded, config_path, cli.json).await,
        Commands::Scenario(args) => scenario::execute(args, &loaded, cli.json).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    if let Err(err) = run(cli).await {
        opsguard::cli::handle_error(err, json_mode);
    }
}
