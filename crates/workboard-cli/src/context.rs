use std::sync::Arc;

use tracing::{debug, warn};
use workboard_api::{
    AuthTokenStore, CredentialStorage, FileStorage, MemoryStorage, RequestClient, Session,
    WorkboardApi,
};
use workboard_common::{ApiError, EventBus, UserId, WorkboardError};
use workboard_config::WorkboardConfig;

/// Everything a command needs, built once from the loaded config.
pub struct Context {
    pub config: WorkboardConfig,
    pub events: EventBus,
    pub auth: Arc<AuthTokenStore>,
    pub client: Arc<RequestClient>,
    pub api: Arc<WorkboardApi>,
    pub session: Session,
}

impl Context {
    pub fn new(config: WorkboardConfig) -> Result<Self, WorkboardError> {
        let storage: Box<dyn CredentialStorage> = match config.storage.resolved_credentials_path() {
            Some(path) => {
                debug!(path = %path.display(), "using credential file");
                Box::new(FileStorage::new(path))
            }
            None => {
                warn!("no data directory; credentials will not outlive this process");
                Box::new(MemoryStorage::new())
            }
        };
        let auth = Arc::new(AuthTokenStore::load(storage));
        let client = Arc::new(RequestClient::new(&config.api, Arc::clone(&auth))?);
        let api = Arc::new(WorkboardApi::new(Arc::clone(&client)));
        let events = EventBus::default();
        let session = Session::new(Arc::clone(&client), events.clone());

        Ok(Self {
            config,
            events,
            auth,
            client,
            api,
            session,
        })
    }

    /// The signed-in user and their token, or `AuthInvalid`.
    pub fn signed_in(&self) -> Result<(UserId, String), ApiError> {
        let credential = self.auth.get_credential().ok_or(ApiError::AuthInvalid)?;
        Ok((credential.user_id.clone(), credential.access_token.clone()))
    }
}
