//! Error types for the studio HTTP pipeline.
//!
//! Every failure that can leave the pipeline is an [`ApiError`]. The variants
//! follow the taxonomy the middleware uses to decide what to do with a failed
//! call:
//!
//! | Variant | Meaning | Notification |
//! |---------|---------|--------------|
//! | [`ApiError::Network`] | no response received | transient |
//! | [`ApiError::Client`] | HTTP 4xx, split by [`ClientErrorKind`] | transient (one per field for 422) |
//! | [`ApiError::Server`] | HTTP 5xx | persistent |
//! | [`ApiError::Rejected`] | 2xx carrying a failure envelope | transient |
//! | [`ApiError::RefreshFailure`] | credentials lost, session cleared | transient + login redirect |
//!
//! The remaining variants are local failures (decoding, storage, file I/O,
//! malformed requests) that never reached the retry or refresh logic.
//!
//! `ApiError` is `Clone` so that a single refresh outcome can be shared by every
//! request waiting on it.

use crate::protocol;
use crate::types::ErrorBody;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Sub-classification of HTTP 4xx failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    /// 400
    BadRequest,
    /// 401, credentials missing or expired
    Auth,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 422, may carry per-field messages
    Validation,
    /// 429
    RateLimited,
    /// Any other 4xx status
    Other,
}

impl ClientErrorKind {
    /// Classify a 4xx status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Auth,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            422 => Self::Validation,
            429 => Self::RateLimited,
            _ => Self::Other,
        }
    }
}

/// Coarse error class, mirrors the top level of the error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// No response was received.
    Network,
    /// The server answered with a 4xx status or a failure envelope.
    Client,
    /// The server answered with a 5xx status.
    Server,
    /// The session could not be refreshed and was discarded.
    RefreshFailure,
    /// The failure happened locally, before or after the exchange.
    Local,
}

/// Errors produced by the HTTP pipeline.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The request never produced a response (connect failure, timeout, reset).
    #[error("network error: {0}")]
    Network(String),

    /// HTTP 4xx response.
    #[error("HTTP {status}: {}", body.message)]
    Client {
        /// Sub-classification of the status
        kind: ClientErrorKind,
        /// Raw status code
        status: u16,
        /// Error body sent by the server, or one synthesized from the status
        body: ErrorBody,
    },

    /// HTTP 5xx response.
    #[error("HTTP {status}: {}", body.message)]
    Server {
        /// Raw status code
        status: u16,
        /// Error body sent by the server, or one synthesized from the status
        body: ErrorBody,
    },

    /// A successful status whose body was a `success: false` envelope.
    #[error("request rejected: {}", body.message)]
    Rejected {
        /// Raw status code
        status: u16,
        /// Error body from the envelope
        body: ErrorBody,
    },

    /// Token refresh failed; the session has been cleared.
    #[error("session refresh failed: {0}")]
    RefreshFailure(String),

    /// Response body could not be decoded into the expected type.
    #[error("decode error: {0}")]
    Decode(String),

    /// Session storage could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),

    /// Local file I/O failed (uploads and downloads).
    #[error("I/O error: {0}")]
    Io(String),

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Build the error for a non-2xx status.
    ///
    /// When the server did not send a usable error body, one is synthesized
    /// from the fixed status message table.
    pub fn from_status(status: u16, body: Option<ErrorBody>) -> Self {
        let body = body.unwrap_or_else(|| {
            ErrorBody::new(format!("HTTP_{status}"), protocol::status_message(status))
        });

        if status >= 500 {
            ApiError::Server { status, body }
        } else {
            ApiError::Client {
                kind: ClientErrorKind::from_status(status),
                status,
                body,
            }
        }
    }

    /// HTTP status associated with this error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Client { status, .. }
            | ApiError::Server { status, .. }
            | ApiError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Coarse classification of the error.
    pub fn class(&self) -> ErrorClass {
        match self {
            ApiError::Network(_) => ErrorClass::Network,
            ApiError::Client { .. } | ApiError::Rejected { .. } => ErrorClass::Client,
            ApiError::Server { .. } => ErrorClass::Server,
            ApiError::RefreshFailure(_) => ErrorClass::RefreshFailure,
            ApiError::Decode(_)
            | ApiError::Storage(_)
            | ApiError::Io(_)
            | ApiError::InvalidRequest(_) => ErrorClass::Local,
        }
    }

    /// Whether the retry middleware may re-attempt the request.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Client { status, .. } | ApiError::Server { status, .. } => {
                crate::client::is_retryable_status(*status)
            }
            _ => false,
        }
    }

    /// Whether this is an HTTP 401.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            ApiError::Client {
                kind: ClientErrorKind::Auth,
                ..
            }
        )
    }

    /// Error body for a failure envelope.
    ///
    /// Server-provided bodies are passed through; local failures get a code
    /// derived from the variant and the error's display text as message.
    pub fn to_error_body(&self) -> ErrorBody {
        match self {
            ApiError::Client { body, .. }
            | ApiError::Server { body, .. }
            | ApiError::Rejected { body, .. } => body.clone(),
            ApiError::Network(_) => ErrorBody::new("NETWORK_ERROR", self.to_string()),
            ApiError::RefreshFailure(_) => ErrorBody::new("SESSION_EXPIRED", self.to_string()),
            ApiError::Decode(_) => ErrorBody::new("DECODE_ERROR", self.to_string()),
            ApiError::Storage(_) => ErrorBody::new("STORAGE_ERROR", self.to_string()),
            ApiError::Io(_) => ErrorBody::new("IO_ERROR", self.to_string()),
            ApiError::InvalidRequest(_) => ErrorBody::new("INVALID_REQUEST", self.to_string()),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classification() {
        let err = ApiError::from_status(404, None);
        assert_eq!(err.class(), ErrorClass::Client);
        assert!(matches!(
            err,
            ApiError::Client {
                kind: ClientErrorKind::NotFound,
                ..
            }
        ));

        let err = ApiError::from_status(503, None);
        assert_eq!(err.class(), ErrorClass::Server);
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn test_synthesized_body_uses_status_table() {
        let body = ApiError::from_status(429, None).to_error_body();
        assert_eq!(body.code, "HTTP_429");
        assert_eq!(body.message, protocol::status_message(429));
    }

    #[test]
    fn test_retryable() {
        assert!(ApiError::Network("reset".into()).is_retryable());
        assert!(ApiError::from_status(500, None).is_retryable());
        assert!(ApiError::from_status(408, None).is_retryable());
        assert!(!ApiError::from_status(501, None).is_retryable());
        assert!(!ApiError::from_status(401, None).is_retryable());
        assert!(!ApiError::RefreshFailure("gone".into()).is_retryable());
    }

    #[test]
    fn test_unauthorized() {
        assert!(ApiError::from_status(401, None).is_unauthorized());
        assert!(!ApiError::from_status(403, None).is_unauthorized());
    }

    #[test]
    fn test_local_error_body_has_message() {
        let body = ApiError::Network("connection refused".into()).to_error_body();
        assert_eq!(body.code, "NETWORK_ERROR");
        assert!(body.message.contains("connection refused"));
    }
}
