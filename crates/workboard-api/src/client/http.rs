//! The HTTP client itself: auth injection, body encoding, cancellation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use workboard_common::ApiError;
use workboard_config::ApiConfig;

use crate::auth::AuthTokenStore;

use super::request::{ApiRequest, RequestBody};
use super::response::{normalize_response, ApiResponse};

/// Sends [`ApiRequest`]s to the configured backend origin.
pub struct RequestClient {
    origin: reqwest::Url,
    http: reqwest::Client,
    auth: Arc<AuthTokenStore>,
}

impl RequestClient {
    pub fn new(config: &ApiConfig, auth: Arc<AuthTokenStore>) -> Result<Self, ApiError> {
        let origin = reqwest::Url::parse(&config.origin)
            .map_err(|e| ApiError::InvalidRequest(format!("bad origin {:?}: {e}", config.origin)))?;
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs.into()))
            .timeout(Duration::from_secs(config.request_timeout_secs.into()))
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { origin, http, auth })
    }

    pub fn origin(&self) -> &reqwest::Url {
        &self.origin
    }

    pub fn auth(&self) -> &Arc<AuthTokenStore> {
        &self.auth
    }

    /// Send and normalize. Non-2xx JSON bodies come back as `Ok`.
    pub async fn send(&self, request: ApiRequest) -> Result<serde_json::Value, ApiError> {
        self.execute(request).await.map(|r| r.body)
    }

    /// Send and deserialize the normalized body into `T`.
    pub async fn send_as<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let value = self.send(request).await?;
        serde_json::from_value(value).map_err(|e| ApiError::Parse(e.to_string()))
    }

    /// Like [`send`](Self::send), but resolves to `Cancelled` as soon as
    /// `cancel` fires. The in-flight HTTP future is dropped, closing the
    /// connection.
    pub async fn send_with_cancel(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, ApiError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("request cancelled by owner");
                Err(ApiError::Cancelled)
            }
            result = self.send(request) => result,
        }
    }

    /// Send and keep the status next to the normalized body.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = request.url(&self.origin)?;
        let method = request.method.clone();
        let path = request.path.clone();

        let mut builder = self.http.request(method.clone(), url);
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ApiError::InvalidRequest(format!("bad header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ApiError::InvalidRequest(format!("bad header value: {e}")))?;
            builder = builder.header(name, value);
        }
        if let Some(token) = self.auth.access_token() {
            builder = builder.bearer_auth(token);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(form) => builder.multipart(form),
            RequestBody::Bytes(bytes) => builder.body(bytes),
        };

        debug!(method = %method, path = %path, "API request");

        let response = builder.send().await.map_err(|e| {
            warn!(method = %method, path = %path, error = %e, "API request failed");
            ApiError::Network(e.to_string())
        })?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        let body = normalize_response(status, &bytes).inspect_err(|e| {
            warn!(method = %method, path = %path, status, error = %e, "API response rejected");
        })?;
        debug!(method = %method, path = %path, status, "API response");
        Ok(ApiResponse { status, body })
    }
}
