//! Response normalization.
//!
//! | status | body                | result                              |
//! |--------|---------------------|-------------------------------------|
//! | 2xx    | empty               | `Ok({})`                            |
//! | 2xx    | valid JSON          | `Ok(json)`                          |
//! | 2xx    | anything else       | `Err(Parse)`                        |
//! | other  | valid JSON          | `Ok(json)` (rejected pass-through)  |
//! | other  | anything else       | `Err(RemoteRejected { text })`      |
//!
//! The pass-through row is deliberate: the backend reports many domain
//! failures as JSON DTOs with a non-2xx status, and callers read them the
//! same way they read successes.

use serde_json::Value;
use tracing::debug;
use workboard_common::ApiError;

/// A settled HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body of a 2xx response. A passed-through rejection becomes
    /// `RemoteRejected`, using the body's `message` field when it has one.
    pub fn accepted(self) -> Result<Value, ApiError> {
        if self.is_success() {
            return Ok(self.body);
        }
        let message = match self.body.get("message").and_then(Value::as_str) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => self.body.to_string(),
        };
        Err(ApiError::RemoteRejected {
            status: self.status,
            message,
        })
    }
}

/// Turn a raw status and body into the value callers see.
pub fn normalize_response(status: u16, body: &[u8]) -> Result<Value, ApiError> {
    let success = (200..300).contains(&status);
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();

    if success {
        if trimmed.is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        return serde_json::from_str(trimmed).map_err(|e| ApiError::Parse(e.to_string()));
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => Ok(pass_through_rejected(status, value)),
        Err(_) => Err(ApiError::RemoteRejected {
            status,
            message: if trimmed.is_empty() {
                reason_phrase(status)
            } else {
                trimmed.to_string()
            },
        }),
    }
}

/// A non-2xx response whose body is JSON is handed back as data.
fn pass_through_rejected(status: u16, value: Value) -> Value {
    debug!(status, "non-2xx JSON body passed through to caller");
    value
}

fn reason_phrase(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(|r| format!("{status} {r}"))
        .unwrap_or_else(|| format!("HTTP {status}"))
}

/// JSON truthiness: `null`, `false`, `0`, and `""` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
