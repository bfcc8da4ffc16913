//! Durable key/value storage for the credential.
//!
//! The credential is persisted under three fixed keys. Every write replaces
//! the whole key set in one step so readers never see half a credential.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;
use workboard_common::UserId;

use super::credential::Credential;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_ID_KEY: &str = "userId";

const CREDENTIAL_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_ID_KEY];

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("credential storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("credential storage is corrupt: {0}")]
    Corrupt(String),
}

/// Backend the [`AuthTokenStore`](super::AuthTokenStore) mirrors into.
pub trait CredentialStorage: Send + Sync {
    fn load(&self) -> Result<Option<Credential>, StorageError>;
    fn save(&self, credential: &Credential) -> Result<(), StorageError>;
    /// Remove all three credential keys together.
    fn clear(&self) -> Result<(), StorageError>;
}

type Entries = BTreeMap<String, String>;

fn write_credential(entries: &mut Entries, credential: &Credential) {
    entries.insert(ACCESS_TOKEN_KEY.into(), credential.access_token.clone());
    entries.insert(USER_ID_KEY.into(), credential.user_id.as_str().to_string());
    match &credential.refresh_token {
        Some(token) => entries.insert(REFRESH_TOKEN_KEY.into(), token.clone()),
        None => entries.remove(REFRESH_TOKEN_KEY),
    };
}

/// An access token without a user id is treated as no credential at all.
fn read_credential(entries: &Entries) -> Option<Credential> {
    let access_token = entries.get(ACCESS_TOKEN_KEY).filter(|t| !t.is_empty())?;
    let user_id = entries.get(USER_ID_KEY).filter(|u| !u.is_empty())?;
    Some(Credential {
        access_token: access_token.clone(),
        user_id: UserId::new(user_id.as_str()),
        refresh_token: entries.get(REFRESH_TOKEN_KEY).cloned(),
    })
}

fn clear_credential(entries: &mut Entries) {
    for key in CREDENTIAL_KEYS {
        entries.remove(key);
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Storage that lives only as long as the process. Used by tests and by
/// hosts without a writable data directory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<Entries>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value stored under `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl CredentialStorage for MemoryStorage {
    fn load(&self) -> Result<Option<Credential>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(read_credential(&entries))
    }

    fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        write_credential(&mut entries, credential);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        clear_credential(&mut entries);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File
// ---------------------------------------------------------------------------

/// Storage backed by a JSON object on disk.
///
/// Keys other than the three credential keys are preserved. Writes go to a
/// sibling temp file which is then renamed over the original.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_entries(&self) -> Result<Entries, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(Entries::new()),
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| StorageError::Corrupt(e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn write_entries(&self, entries: &Entries) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let json =
            serde_json::to_vec_pretty(entries).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), "credential storage written");
        Ok(())
    }

    fn update(&self, change: impl FnOnce(&mut Entries)) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_entries()?;
        change(&mut entries);
        self.write_entries(&entries)
    }
}

impl CredentialStorage for FileStorage {
    fn load(&self) -> Result<Option<Credential>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(read_credential(&self.read_entries()?))
    }

    fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        self.update(|entries| write_credential(entries, credential))
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.update(clear_credential)
    }
}
