//! Error types for the Comfort Cloud client

use std::io;

use thiserror::Error;

/// Result type alias for Comfort Cloud operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comfort Cloud errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unexpected HTTP status during a login step
    #[error("{step}: expected status {expected}, got {actual}")]
    Protocol {
        /// Login step that failed (e.g. `authorize`, `get_token`)
        step: &'static str,
        /// Status the step requires
        expected: u16,
        /// Status the server returned
        actual: u16,
    },

    /// Malformed JWT, JSON, redirect or HTML form
    #[error("Parse error: {0}")]
    Parse(String),

    /// Decoded token fails the validity predicate
    #[error("Token validation failed: {0}")]
    Validation(String),

    /// Authenticated API call returned an unexpected status
    #[error("{operation}: expected status code {expected}, got {actual}: {status_text}")]
    Status {
        /// Name of the API operation
        operation: String,
        /// Status the caller expected
        expected: u16,
        /// Status the server returned
        actual: u16,
        /// Raw status line text
        status_text: String,
    },

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Requested device or resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create a protocol error for a login step
    #[must_use]
    pub fn protocol(step: &'static str, expected: u16, actual: reqwest::StatusCode) -> Self {
        Self::Protocol {
            step,
            expected,
            actual: actual.as_u16(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_names_step_and_status() {
        let err = Error::protocol("authorize", 302, reqwest::StatusCode::OK);
        assert_eq!(err.to_string(), "authorize: expected status 302, got 200");
    }

    #[test]
    fn status_error_includes_status_text() {
        let err = Error::Status {
            operation: "get_groups".to_string(),
            expected: 200,
            actual: 403,
            status_text: "403 Forbidden".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "get_groups: expected status code 200, got 403: 403 Forbidden"
        );
    }
}
