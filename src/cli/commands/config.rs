//! Implementation of the `opsguard config` commands.

use anyhow::Result;
use std::path::Path;

use crate::cli::output::{output, CommandOutput};
use crate::cli::types::{ConfigArgs, ConfigCommands};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

/// Load configuration from `path`, or from `.opsguard/` and the environment.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ConfigShowOutput {
    pub source: String,
    pub config: Config,
}

impl CommandOutput for ConfigShowOutput {
    fn to_human(&self) -> String {
        let yaml = serde_yaml::to_string(&self.config).unwrap_or_default();
        format!("# source: {}\n{}", self.source, yaml.trim_end())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ConfigValidateOutput {
    pub valid: bool,
    pub source: String,
}

impl CommandOutput for ConfigValidateOutput {
    fn to_human(&self) -> String {
        format!("Configuration OK ({})", self.source)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn describe_source(path: Option<&Path>) -> String {
    path.map_or_else(
        || ".opsguard/ + OPSGUARD_* environment".to_string(),
        |p| p.display().to_string(),
    )
}

pub async fn execute(
    args: ConfigArgs,
    config: Config,
    config_path: Option<&Path>,
    json_mode: bool,
) -> Result<()> {
    let source = describe_source(config_path);

    match args.command {
        ConfigCommands::Show => output(&ConfigShowOutput { source, config }, json_mode),
        ConfigCommands::Validate => output(
            &ConfigValidateOutput {
                valid: true,
                source,
            },
            json_mode,
        ),
    }
    Ok(())
}
