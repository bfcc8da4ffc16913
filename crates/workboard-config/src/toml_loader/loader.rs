//! Core TOML config loading: read from path or platform default.

use std::path::Path;

use tracing::{info, warn};
use workboard_common::ConfigError;

use crate::schema::WorkboardConfig;
use crate::validation;

use super::paths::{create_default_config, default_config_path};

/// Environment variable that replaces `api.origin`.
pub const ORIGIN_ENV: &str = "WORKBOARD_API_ORIGIN";

/// Load config from a specific TOML file path.
///
/// Missing fields take serde defaults. Validation problems are logged as a
/// warning; the caller decides whether to run [`validation::validate`] again
/// as a hard check.
pub fn load_from_path(path: &Path) -> Result<WorkboardConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("failed to read {}: {e}", path.display())))?;

    let config: WorkboardConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    if let Err(e) = validation::validate(&config) {
        warn!("config validation warning: {e}");
    }

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Load config from the platform-specific default path.
///
/// If the file does not exist, creates a commented default file and returns defaults.
pub fn load_default() -> Result<WorkboardConfig, ConfigError> {
    let path = default_config_path()?;

    match load_from_path(&path) {
        Ok(config) => Ok(config),
        Err(ConfigError::FileNotFound(_)) => {
            info!("no config found at {}, creating default", path.display());
            create_default_config(&path)?;
            Ok(WorkboardConfig::default())
        }
        Err(e) => Err(e),
    }
}

/// Apply environment overrides on top of a loaded config.
pub fn apply_env_overrides(config: &mut WorkboardConfig) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides_from(
    config: &mut WorkboardConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(origin) = lookup(ORIGIN_ENV).filter(|v| !v.trim().is_empty()) {
        info!(origin = %origin, "api origin overridden from environment");
        config.api.origin = origin.trim().to_string();
    }
}
