//! Configuration management for the voice-order front end
//!
//! Supports loading configuration from:
//! - YAML/TOML files under `config/`
//! - Environment variables (VOICE_ORDER prefix, `__` separator)

pub mod pipeline;
pub mod settings;

pub use pipeline::{PipelineConfig, SanityConfig};
pub use settings::{
    load_settings, BackendConfig, BackendProvider, BackendsConfig, DialogueConfig,
    ObservabilityConfig, PersistenceConfig, RateLimitConfig, ServerConfig, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
