use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Environment variable prefix; nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "REMEDY_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid evolution alpha: {0}. Must be in (0, 1]")]
    InvalidAlpha(f64),

    #[error("Invalid confidence_floor: {0}. Must be in [0, 1)")]
    InvalidConfidenceFloor(f64),

    #[error("Invalid temperature: {0}. Must be positive")]
    InvalidTemperature(f64),

    #[error(
        "Invalid escalation thresholds: explore_after ({0}) must not exceed transform_after ({1})"
    )]
    InvalidEscalationThresholds(u32, u32),

    #[error("Invalid budget: llm_calls must be at least 1")]
    InvalidBudget,

    #[error("Invalid embedding timeout: must be at least 1 second")]
    InvalidEmbeddingTimeout,

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .remedy/config.yaml (project config)
    /// 3. .remedy/local.yaml (project local overrides, optional)
    /// 4. Environment variables (REMEDY_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".remedy/config.yaml"))
            .merge(Yaml::file(".remedy/local.yaml"))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring `REMEDY_*` overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.context_type.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "context_type cannot be empty".to_string(),
            ));
        }

        // Database
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        // Logging
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        // Embeddings
        if config.embedding.timeout_secs == 0 {
            return Err(ConfigError::InvalidEmbeddingTimeout);
        }
        if config.embedding.fallback_dimension == 0 {
            return Err(ConfigError::ValidationFailed(
                "embedding.fallback_dimension must be at least 1".to_string(),
            ));
        }

        // Router
        let floor = config.router.confidence_floor;
        if !(0.0..1.0).contains(&floor) {
            return Err(ConfigError::InvalidConfidenceFloor(floor));
        }
        if !(config.router.temperature > 0.0) || !config.router.temperature.is_finite() {
            return Err(ConfigError::InvalidTemperature(config.router.temperature));
        }

        // Evolution
        let alpha = config.evolution.alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(ConfigError::InvalidAlpha(alpha));
        }
        if config.evolution.saturation_samples <= 0.0 {
            return Err(ConfigError::ValidationFailed(
                "evolution.saturation_samples must be positive".to_string(),
            ));
        }

        // Escalation
        if config.escalation.explore_after > config.escalation.transform_after {
            return Err(ConfigError::InvalidEscalationThresholds(
                config.escalation.explore_after,
                config.escalation.transform_after,
            ));
        }

        // Budget
        if config.budget.llm_calls == 0 {
            return Err(ConfigError::InvalidBudget);
        }

        Ok(())
    }
}
