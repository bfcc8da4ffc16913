//! workboard configuration.
//!
//! TOML-based configuration with full validation. All sections use
//! defaults so partial configs work out of the box.

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    ApiConfig, LogLevel, LoggingConfig, RealtimeConfig, ReconnectConfig, ReconnectMode,
    SearchConfig, StorageConfig, WorkboardConfig, CONFIG_SCHEMA_VERSION,
};

use std::path::Path;

use workboard_common::ConfigError;

/// Load config from `path` (or the platform default when `None`), apply
/// environment overrides, and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<WorkboardConfig, ConfigError> {
    let mut config = match path {
        Some(p) => toml_loader::load_from_path(p)?,
        None => toml_loader::load_default()?,
    };
    toml_loader::apply_env_overrides(&mut config);
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &WorkboardConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
