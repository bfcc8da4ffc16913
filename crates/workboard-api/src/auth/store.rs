//! Process-wide holder of the bearer credential.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{info, warn};

use super::credential::Credential;
use super::storage::{CredentialStorage, MemoryStorage};

/// Single-writer, multi-reader credential store.
///
/// Readers get an `Arc` snapshot of the whole credential; writers swap the
/// reference under a write lock, so a reader never observes a token from one
/// login paired with the user id of another. Durable storage is updated
/// while the writer lock is still held.
pub struct AuthTokenStore {
    current: RwLock<Option<Arc<Credential>>>,
    storage: Box<dyn CredentialStorage>,
    writer: Mutex<()>,
}

impl AuthTokenStore {
    pub fn new(storage: Box<dyn CredentialStorage>) -> Self {
        Self {
            current: RwLock::new(None),
            storage,
            writer: Mutex::new(()),
        }
    }

    /// A store backed by process memory only.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::new()))
    }

    /// Create a store and restore any credential persisted by a previous run.
    pub fn load(storage: Box<dyn CredentialStorage>) -> Self {
        let store = Self::new(storage);
        match store.storage.load() {
            Ok(Some(credential)) => {
                info!(user_id = %credential.user_id, "restored persisted credential");
                *store.current.write().unwrap_or_else(PoisonError::into_inner) =
                    Some(Arc::new(credential));
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "ignoring unreadable credential storage"),
        }
        store
    }

    pub fn set_credential(&self, credential: Credential) {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = self.storage.save(&credential) {
            warn!(error = %e, "credential not persisted; session will not survive restart");
        }
        info!(user_id = %credential.user_id, "credential set");
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(credential));
    }

    pub fn get_credential(&self) -> Option<Arc<Credential>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.get_credential().map(|c| c.access_token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.get_credential().is_some()
    }

    /// Drop the credential from memory and durable storage.
    pub fn clear(&self) {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Err(e) = self.storage.clear() {
            warn!(error = %e, "failed to clear persisted credential");
        }
        if let Some(previous) = previous {
            info!(user_id = %previous.user_id, "credential cleared");
        }
    }
}

impl std::fmt::Debug for AuthTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTokenStore")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
