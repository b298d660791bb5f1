//! DuoKey error types using thiserror 2.0.
//!
//! Every error carries the phase that failed so callers can tell bad input,
//! network failures and server rejections apart through [`DuoKeyError::kind`]
//! instead of matching on messages.

use reqwest::Method;
use thiserror::Error;

/// Broad classification of a [`DuoKeyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Client configuration is missing or malformed.
    Configuration,
    /// Discovery, token grant, token validation or token refresh failed.
    Authentication,
    /// The request could not be built or its payload could not be encoded.
    BadInput,
    /// The request never produced a complete response.
    Network,
    /// The server answered, but rejected the request or its answer was unusable.
    Remote,
}

/// Errors recorded while assembling a request.
///
/// These never abort construction; they are carried on the request and
/// surfaced by `send` as [`DuoKeyError::BadRequest`].
#[derive(Error, Debug)]
pub enum BuildError {
    /// Base URL and route do not form a valid URL
    #[error("InvalidEndpointURL ({url})")]
    InvalidEndpointUrl {
        /// The rejected URL
        url: String,
        /// Parser error
        #[source]
        source: url::ParseError,
    },

    /// HTTP method outside GET, POST, PUT and DELETE
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(Method),

    /// Parameters could not be encoded as a query string
    #[error("failed to encode query parameters: {0}")]
    QueryEncoding(#[source] serde_json::Error),
}

/// Failures that happen between dispatching a request and reading its body.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The call context was cancelled
    #[error("request cancelled")]
    Cancelled,

    /// The call context deadline passed
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// The HTTP client failed (connect, TLS, I/O, client-level timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The access token could not be refreshed
    #[error("authentication failed: {0}")]
    Authentication(String),
}

impl TransportError {
    /// Whether the failure comes from a deadline or a client timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::DeadlineExceeded => true,
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// DuoKey client errors.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DuoKeyError {
    /// OIDC discovery document could not be fetched or parsed
    #[error("discovery failed for issuer {issuer}: {reason}")]
    Discovery {
        /// Configured issuer
        issuer: String,
        /// What went wrong
        reason: String,
    },

    /// Password grant was rejected
    #[error("password grant failed: {0}")]
    Grant(String),

    /// Token returned by the grant is unusable
    #[error("token validation failed: {0}")]
    TokenValidation(String),

    /// Request could not be built
    #[error("bad request: {0}")]
    BadRequest(#[from] BuildError),

    /// Parameters could not be serialized
    #[error("failed to serialize request body: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Response body did not match the expected result type
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),

    /// Request did not complete
    #[error("failed to make HTTP request: {0}")]
    Transport(#[from] TransportError),

    /// Server answered with a status >= 300 or reported a failure in its body
    #[error("request failed with status {status}: {body}")]
    Remote {
        /// HTTP status code
        status: u16,
        /// Response body or the failure reported by the server
        body: String,
    },

    /// Caller-supplied input failed validation
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for DuoKey operations.
pub type DuoKeyResult<T> = Result<T, DuoKeyError>;

impl DuoKeyError {
    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) => ErrorKind::Configuration,
            Self::Discovery { .. }
            | Self::Grant(_)
            | Self::TokenValidation(_)
            | Self::Transport(TransportError::Authentication(_)) => ErrorKind::Authentication,
            Self::BadRequest(_) | Self::Serialization(_) | Self::InvalidInput(_) => {
                ErrorKind::BadInput
            }
            Self::Transport(_) => ErrorKind::Network,
            Self::Remote { .. } | Self::Decode(_) => ErrorKind::Remote,
        }
    }

    /// Whether the call context deadline or the client timeout fired.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }

    /// Whether the call context was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Cancelled))
    }

    /// HTTP status of a remote rejection.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Create a discovery error.
    #[must_use]
    pub fn discovery(issuer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Discovery {
            issuer: issuer.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid input error.
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DuoKeyError::Remote {
            status: 500,
            body: "{\"error\":\"boom\"}".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "request failed with status 500: {\"error\":\"boom\"}"
        );

        let err = DuoKeyError::BadRequest(BuildError::UnsupportedMethod(Method::PATCH));
        assert_eq!(err.to_string(), "bad request: unsupported HTTP method: PATCH");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            DuoKeyError::invalid_config("missing").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            DuoKeyError::discovery("https://issuer", "404").kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            DuoKeyError::Transport(TransportError::Authentication("expired".into())).kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            DuoKeyError::invalid_input("empty key id").kind(),
            ErrorKind::BadInput
        );
        assert_eq!(
            DuoKeyError::Transport(TransportError::DeadlineExceeded).kind(),
            ErrorKind::Network
        );
        assert_eq!(
            DuoKeyError::Remote {
                status: 404,
                body: String::new()
            }
            .kind(),
            ErrorKind::Remote
        );
    }

    #[test]
    fn test_timeout_and_cancellation_are_distinguishable() {
        let deadline = DuoKeyError::Transport(TransportError::DeadlineExceeded);
        assert!(deadline.is_timeout());
        assert!(!deadline.is_cancelled());

        let cancelled = DuoKeyError::Transport(TransportError::Cancelled);
        assert!(cancelled.is_cancelled());
        assert!(!cancelled.is_timeout());
    }

    #[test]
    fn test_status_only_for_remote() {
        let err = DuoKeyError::Remote {
            status: 503,
            body: String::new(),
        };
        assert_eq!(err.status(), Some(503));
        assert_eq!(DuoKeyError::Grant("denied".into()).status(), None);
    }
}
