//! Configuration for the interview analysis engine
//!
//! Settings are layered: `config/default.yaml` is overridden by
//! `config/{env}.yaml`, which is overridden by environment variables
//! prefixed `INTERVIEW_ENGINE_`.

mod settings;

pub use settings::{
    load_settings, EngineConfig, ObservabilityConfig, RuntimeEnvironment, ServerConfig, Settings,
};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
