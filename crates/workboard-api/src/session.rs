//! Login, logout, and the session guard.
//!
//! The guard is the only place that turns a failed validation probe into
//! `AuthInvalid`: it clears the credential and sends the UI to the login
//! entry point. Individual call sites never do this themselves.

use std::sync::Arc;

use tracing::{info, warn};
use workboard_common::{ApiError, EventBus, UiEvent, UserId};

use crate::auth::{AuthTokenStore, Credential};
use crate::client::{is_truthy, ApiRequest, RequestClient};
use crate::types::{LoginRequest, LoginResponse};

/// Result of a login attempt that reached the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub success: bool,
    pub user_id: Option<UserId>,
    /// Message the UI shows either way.
    pub message: String,
}

pub struct Session {
    client: Arc<RequestClient>,
    events: EventBus,
}

impl Session {
    pub fn new(client: Arc<RequestClient>, events: EventBus) -> Self {
        Self { client, events }
    }

    fn auth(&self) -> &Arc<AuthTokenStore> {
        self.client.auth()
    }

    pub async fn login(&self, user_id: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        let body = serde_json::to_value(LoginRequest {
            user_id: user_id.to_string(),
            password: password.to_string(),
        })
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        let response: LoginResponse = self
            .client
            .send_as(ApiRequest::post("/api/auth/logIn").json(body))
            .await?;
        let message = response.message.clone().unwrap_or_default();

        match (response.success, response.token) {
            (true, Some(token)) if !token.is_empty() => {
                let user = response.user_id.unwrap_or_else(|| UserId::new(user_id));
                let mut credential = Credential::new(token, user.clone());
                credential.refresh_token = response.refresh_token;
                self.auth().set_credential(credential);
                info!(user_id = %user, "logged in");
                self.events.publish(UiEvent::SessionStarted {
                    user_id: user.clone(),
                });
                Ok(LoginOutcome {
                    success: true,
                    user_id: Some(user),
                    message,
                })
            }
            (success, _) => {
                warn!(user_id, success, "login refused");
                Ok(LoginOutcome {
                    success: false,
                    user_id: None,
                    message,
                })
            }
        }
    }

    pub fn logout(&self) {
        self.auth().clear();
        self.events.publish(UiEvent::SessionEnded);
    }

    pub fn guard(&self) -> AuthGuard {
        AuthGuard {
            client: Arc::clone(&self.client),
            events: self.events.clone(),
        }
    }
}

/// Probes `/api/auth/validate` and enforces the one-way transition to
/// unauthenticated.
#[derive(Clone)]
pub struct AuthGuard {
    client: Arc<RequestClient>,
    events: EventBus,
}

impl AuthGuard {
    /// `Ok` when the backend confirms the session. A missing credential, a
    /// non-2xx answer, or a falsy payload invalidates the session. Transport
    /// failures are returned unchanged and leave the credential in place.
    pub async fn check(&self) -> Result<(), ApiError> {
        if !self.client.auth().is_authenticated() {
            return Err(self.invalidate("no credential"));
        }
        match self.client.execute(ApiRequest::get("/api/auth/validate")).await {
            Ok(response) if response.is_success() && is_truthy(&response.body) => Ok(()),
            Ok(response) => Err(self.invalidate(&format!("validation returned {}", response.status))),
            Err(e @ (ApiError::Network(_) | ApiError::Cancelled)) => Err(e),
            Err(e) => Err(self.invalidate(&e.to_string())),
        }
    }

    fn invalidate(&self, reason: &str) -> ApiError {
        warn!(reason, "session invalid; returning to login");
        self.client.auth().clear();
        self.events.publish(UiEvent::NavigateToLogin);
        ApiError::AuthInvalid
    }
}
