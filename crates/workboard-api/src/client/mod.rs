//! Generic request wrapper over the backend's HTTP API.
//!
//! Every call resolves to either a JSON value or an [`ApiError`]; ordinary
//! HTTP error statuses never panic or escape as transport errors.
//!
//! [`ApiError`]: workboard_common::ApiError

mod http;
mod request;
mod response;

#[cfg(test)]
mod tests;

pub use http::RequestClient;
pub use request::{ApiRequest, RequestBody, API_PREFIX};
pub use response::{is_truthy, normalize_response, ApiResponse};
