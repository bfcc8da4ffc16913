//! Bearer credential ownership: the in-memory store every caller reads
//! and the durable storage it mirrors into.

mod credential;
mod storage;
mod store;

pub use credential::Credential;
pub use storage::{
    CredentialStorage, FileStorage, MemoryStorage, StorageError, ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY, USER_ID_KEY,
};
pub use store::AuthTokenStore;
