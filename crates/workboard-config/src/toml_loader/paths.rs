//! Where workboard keeps its files, and first-run creation of the config.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use workboard_common::ConfigError;

use super::template::default_config_toml;

const APP_DIR: &str = "workboard";

/// `<config_dir>/workboard/config.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::ParseError("could not determine config directory".into()))?;
    Ok(config_dir.join(APP_DIR).join("config.toml"))
}

/// `<data_dir>/workboard/credentials.json`, when the platform has a data dir.
pub fn default_credentials_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_DIR).join("credentials.json"))
}

/// Write the commented default config to `path`. An existing file is left
/// untouched.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    let io_err = |what: &str, e: std::io::Error| {
        ConfigError::ParseError(format!("failed to {what} {}: {e}", path.display()))
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err("create directory for", e))?;
    }

    let mut file = match std::fs::OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            debug!(path = %path.display(), "config already exists; not overwriting");
            return Ok(());
        }
        Err(e) => return Err(io_err("create", e)),
    };
    file.write_all(default_config_toml().as_bytes())
        .map_err(|e| io_err("write default config to", e))?;

    info!(path = %path.display(), "created default config");
    Ok(())
}
