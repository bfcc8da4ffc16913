//! Request description, built per call and consumed by `send`.

use std::collections::BTreeMap;

use reqwest::Method;
use workboard_common::ApiError;

/// Every backend route lives under this prefix.
pub const API_PREFIX: &str = "/api/";

/// Request payload.
#[derive(Debug, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Serialized as JSON with `Content-Type: application/json`.
    Json(serde_json::Value),
    /// Multipart form; the transport sets its own boundary header.
    Multipart(reqwest::multipart::Form),
    /// Raw bytes sent without a content type.
    Bytes(Vec<u8>),
}

/// An outgoing API call.
#[derive(Debug)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: BTreeMap<String, String>,
    pub(crate) body: RequestBody,
    pub(crate) headers: Vec<(String, String)>,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            body: RequestBody::Empty,
            headers: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add a query parameter. Parameters are emitted sorted by key.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.insert(key.into(), value.to_string());
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Canonical `k=v&k=v` form of the query, keys sorted, values percent-encoded.
    pub fn query_string(&self) -> String {
        let mut url = match reqwest::Url::parse("http://localhost/") {
            Ok(url) => url,
            Err(_) => return String::new(),
        };
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }
        url.query().unwrap_or_default().to_string()
    }

    /// Resolve the full URL against the backend origin.
    pub(crate) fn url(&self, origin: &reqwest::Url) -> Result<reqwest::Url, ApiError> {
        if !self.path.starts_with(API_PREFIX) {
            return Err(ApiError::InvalidRequest(format!(
                "path {:?} is outside {API_PREFIX}",
                self.path
            )));
        }
        let mut url = origin
            .join(&self.path)
            .map_err(|e| ApiError::InvalidRequest(format!("bad path {:?}: {e}", self.path)))?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }
        Ok(url)
    }
}
