use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Durable client storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Where the credential file lives. `None` uses the platform data directory.
    pub credentials_path: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the credential file path, falling back to
    /// `<data_dir>/workboard/credentials.json`.
    pub fn resolved_credentials_path(&self) -> Option<PathBuf> {
        self.credentials_path
            .clone()
            .or_else(crate::toml_loader::default_credentials_path)
    }
}
