//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod client;
mod tracking;

pub use client::{ApiConfig, RealtimeConfig, RoutingConfig, DEFAULT_ROUTING_URL};
pub use tracking::{MapConfig, TrackingConfig, WorkflowConfig, MAX_DUE_SOON_HOURS};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "fleet.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "FLEET_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "FLEET";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "FLEET_LOG";

use serde::Deserialize;

/// Errors loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// REST backend.
    pub api: ApiConfig,
    /// Realtime channel.
    pub realtime: RealtimeConfig,
    /// Routing provider and route cache.
    pub routing: RoutingConfig,
    /// Live aggregation.
    pub tracking: TrackingConfig,
    /// Map assembly.
    pub map: MapConfig,
    /// Workflow views.
    pub workflow: WorkflowConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `fleet.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the pipeline misbehave silently.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api.base_url is empty".to_string()));
        }
        if self.routing.cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "routing.cache_capacity must be at least 1".to_string(),
            ));
        }
        if !(self.map.movement_threshold_deg.is_finite() && self.map.movement_threshold_deg >= 0.0) {
            return Err(ConfigError::Invalid(
                "map.movement_threshold_deg must be a non-negative number".to_string(),
            ));
        }
        if !(1..=MAX_DUE_SOON_HOURS).contains(&self.workflow.due_soon_hours) {
            return Err(ConfigError::Invalid(format!(
                "workflow.due_soon_hours must be between 1 and {MAX_DUE_SOON_HOURS}"
            )));
        }
        Ok(())
    }

    /// Token for the realtime handshake: its own, else the API token.
    pub fn realtime_token(&self) -> Option<String> {
        self.realtime
            .token
            .clone()
            .or_else(|| self.api.token.clone())
            .filter(|t| !t.is_empty())
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}
