//! Error types for the Okta API client.
//!
//! # Design
//! Non-200 responses carry the status code, the provider's error payload
//! (decoded best-effort) and the full request URL as plain fields, so
//! callers can match on them instead of parsing a message.

use thiserror::Error;

use crate::types::ErrorResponse;

/// Errors returned by `OktaClient` parse methods, transports and
/// `BlockingClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be sent or the response could not be read
    /// (DNS, connection, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered with a status other than 200.
    #[error("error hitting api endpoint {endpoint}: HTTP {status} {}", .response.error_code)]
    Http {
        status: u16,
        response: ErrorResponse,
        endpoint: String,
    },

    /// A 200 response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A next-page link does not point below the API base.
    #[error("invalid pagination link: {0}")]
    InvalidLink(String),

    /// Missing or malformed configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// HTTP status for `Http` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Provider error code (e.g. `E0000004`) for `Http` errors with a
    /// decodable error body.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            ApiError::Http { response, .. } if !response.error_code.is_empty() => {
                Some(&response.error_code)
            }
            _ => None,
        }
    }
}
