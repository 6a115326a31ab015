use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::domain::models::MAX_TTL_SECS;

/// Directory holding project configuration files.
pub const CONFIG_DIR: &str = ".opsguard";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "OPSGUARD_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Invalid lock ttl_secs: {0}. Must be between 1 and {MAX_TTL_SECS}")]
    InvalidLockTtl(u64),

    #[error("Invalid failure_threshold: {0}. Must be at least 1")]
    InvalidFailureThreshold(u32),

    #[error("Invalid half_open_max_calls: {0}. Must be at least 1")]
    InvalidHalfOpenMaxCalls(u32),

    #[error("Invalid recovery_timeout_secs: must be at least 1")]
    InvalidRecoveryTimeout,

    #[error("Invalid backoff configuration: base_delay_ms ({0}) must not exceed max_delay_ms ({1})")]
    InvalidBackoff(u64, u64),

    #[error("Invalid exponential_base: {0}. Must be at least 1.0")]
    InvalidExponentialBase(f64),

    #[error("Invalid l1_max_size: must be at least 1")]
    InvalidCacheSize,

    #[error("Invalid default_ttl_secs: {0}. Must not exceed {MAX_TTL_SECS}")]
    InvalidCacheTtl(u64),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .opsguard/config.yaml (project config)
    /// 3. .opsguard/local.yaml (local overrides, optional)
    /// 4. Environment variables (OPSGUARD_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Same as [`ConfigLoader::load`] with `.opsguard/` resolved under `root`.
    pub fn load_from_dir(root: impl AsRef<Path>) -> Result<Config> {
        let dir = root.as_ref().join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(
                config.logging.rotation.clone(),
            ));
        }

        if config.lock.ttl_secs == 0 || config.lock.ttl_secs > MAX_TTL_SECS {
            return Err(ConfigError::InvalidLockTtl(config.lock.ttl_secs));
        }

        let breaker = &config.circuit_breaker;
        if breaker.failure_threshold == 0 {
            return Err(ConfigError::InvalidFailureThreshold(
                breaker.failure_threshold,
            ));
        }
        if breaker.half_open_max_calls == 0 {
            return Err(ConfigError::InvalidHalfOpenMaxCalls(
                breaker.half_open_max_calls,
            ));
        }
        if breaker.recovery_timeout_secs == 0 {
            return Err(ConfigError::InvalidRecoveryTimeout);
        }

        if config.retry.base_delay_ms > config.retry.max_delay_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.base_delay_ms,
                config.retry.max_delay_ms,
            ));
        }
        let base = config.retry.exponential_base;
        if base.is_nan() || base < 1.0 {
            return Err(ConfigError::InvalidExponentialBase(
                config.retry.exponential_base,
            ));
        }

        if config.cache.l1_max_size == 0 {
            return Err(ConfigError::InvalidCacheSize);
        }
        if config.cache.default_ttl_secs > MAX_TTL_SECS {
            return Err(ConfigError::InvalidCacheTtl(config.cache.default_ttl_secs));
        }

        Ok(())
    }
}
