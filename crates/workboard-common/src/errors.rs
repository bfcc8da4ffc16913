use std::path::PathBuf;

/// Closed classification of client-side failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No response was received.
    Network,
    /// A response arrived but its body could not be decoded.
    Parse,
    /// The session probe failed; the credential must be discarded.
    AuthInvalid,
    /// Non-2xx response whose body was not a JSON document.
    RemoteRejected,
    /// A realtime channel operation was attempted while closed.
    NotConnected,
    /// The request could not be built.
    InvalidRequest,
    /// The caller cancelled the request before it settled.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("session is no longer valid")]
    AuthInvalid,

    #[error("HTTP {status}: {message}")]
    RemoteRejected { status: u16, message: String },

    #[error("channel is not connected")]
    NotConnected,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Parse(_) => ErrorKind::Parse,
            Self::AuthInvalid => ErrorKind::AuthInvalid,
            Self::RemoteRejected { .. } => ErrorKind::RemoteRejected,
            Self::NotConnected => ErrorKind::NotConnected,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// The message a UI would show for this failure.
    ///
    /// For `RemoteRejected` this is the raw body text the server sent.
    pub fn user_message(&self) -> String {
        match self {
            Self::RemoteRejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WorkboardError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ParseError("unexpected token".into());
        assert_eq!(err.to_string(), "config parse error: unexpected token");

        let err = ConfigError::ValidationError("api.origin must be http(s)".into());
        assert_eq!(
            err.to_string(),
            "config validation error: api.origin must be http(s)"
        );
    }

    #[test]
    fn api_error_kinds() {
        assert_eq!(ApiError::Network("refused".into()).kind(), ErrorKind::Network);
        assert_eq!(ApiError::Parse("eof".into()).kind(), ErrorKind::Parse);
        assert_eq!(ApiError::AuthInvalid.kind(), ErrorKind::AuthInvalid);
        assert_eq!(ApiError::NotConnected.kind(), ErrorKind::NotConnected);
        assert_eq!(ApiError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(
            ApiError::InvalidRequest("bad path".into()).kind(),
            ErrorKind::InvalidRequest
        );
        let rejected = ApiError::RemoteRejected {
            status: 500,
            message: "Internal Server Error".into(),
        };
        assert_eq!(rejected.kind(), ErrorKind::RemoteRejected);
    }

    #[test]
    fn remote_rejected_user_message_is_raw_body() {
        let err = ApiError::RemoteRejected {
            status: 502,
            message: "Bad Gateway".into(),
        };
        assert_eq!(err.user_message(), "Bad Gateway");
        assert_eq!(err.to_string(), "HTTP 502: Bad Gateway");
    }

    #[test]
    fn workboard_error_from_api() {
        let err: WorkboardError = ApiError::NotConnected.into();
        assert!(matches!(err, WorkboardError::Api(ApiError::NotConnected)));
        assert_eq!(err.to_string(), "channel is not connected");
    }

    #[test]
    fn workboard_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: WorkboardError = io_err.into();
        assert!(matches!(err, WorkboardError::Io(_)));
        assert!(err.to_string().contains("file missing"));
    }
}
