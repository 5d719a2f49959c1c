//! Error types for the wxapp client.
//!
//! # Design
//! `ApiError` is what every facade call returns on failure. The variants
//! follow where the call stopped: before the network (`InvalidRequest`,
//! `NotAuthenticated`), at the transport (`NetworkError`), at the HTTP status
//! (`HttpError`), or inside the backend envelope (`SessionExpired`,
//! `BusinessError`). `StorageError` and `TransportError` belong to the two
//! injectable seams and are folded into `ApiError` where the facade sees them.

use thiserror::Error;

/// Errors returned by `Facade::call` and the `ApiClient` parse step.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The descriptor was rejected before anything else happened.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The call requires a session token and none is stored. No request was
    /// issued.
    #[error("not authenticated")]
    NotAuthenticated,

    /// No response was received.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The transport-level status was not 200.
    #[error("HTTP {status}")]
    HttpError { status: u16, body: String },

    /// The envelope carried the session-expired code.
    #[error("session expired")]
    SessionExpired,

    /// The envelope carried any other non-success code.
    #[error("business error {code}: {}", msg.as_deref().unwrap_or("<no message>"))]
    BusinessError { code: i64, msg: Option<String> },

    /// The request payload could not be serialized to a JSON object.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// The response body was not an envelope, or the payload did not match
    /// the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The session could not be persisted.
    #[error("session storage: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Whether this failure ends the current session.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::NotAuthenticated | ApiError::SessionExpired)
    }
}

/// Failure of the durable session storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage format: {0}")]
    Format(#[from] serde_json::Error),
}

/// The transport could not produce a response at all.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError(err.to_string())
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::NetworkError(err.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_error_display_includes_message() {
        let err = ApiError::BusinessError {
            code: 500,
            msg: Some("boom".to_string()),
        };
        assert_eq!(err.to_string(), "business error 500: boom");

        let err = ApiError::BusinessError { code: 400, msg: None };
        assert_eq!(err.to_string(), "business error 400: <no message>");
    }

    #[test]
    fn transport_error_becomes_network_error() {
        let err: ApiError = TransportError("connection refused".to_string()).into();
        assert!(matches!(err, ApiError::NetworkError(ref m) if m == "connection refused"));
    }

    #[test]
    fn auth_failures_are_flagged() {
        assert!(ApiError::NotAuthenticated.is_auth_failure());
        assert!(ApiError::SessionExpired.is_auth_failure());
        assert!(!ApiError::HttpError { status: 401, body: String::new() }.is_auth_failure());
    }
}
