//! Error types for upstream registry operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while talking to an upstream registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Failed to connect to registry.
    #[error("Failed to connect to registry at {url}: {source}")]
    ConnectionFailed {
        /// Registry URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The request did not complete in time.
    #[error("Request to {url} timed out")]
    Timeout {
        /// Request URL.
        url: String,
    },

    /// Authentication failed.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Error message.
        message: String,
    },

    /// HTTP error from registry.
    #[error("HTTP error from registry: {status} - {message}")]
    HttpError {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {source}")]
    JsonError {
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A certificate file could not be used.
    #[error("Invalid certificate {path}: {message}")]
    InvalidCertificate {
        /// Certificate file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// File I/O error.
    #[error("File I/O error at {path}: {source}")]
    IoError {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map_or_else(|| "unknown".to_string(), ToString::to_string);
        if err.is_timeout() {
            Self::Timeout { url }
        } else if err.is_connect() {
            Self::ConnectionFailed { url, source: err }
        } else if err.is_decode() {
            Self::HttpError {
                status: 0,
                message: format!("Malformed response from {url}: {err}"),
            }
        } else {
            Self::HttpError {
                status: err.status().map_or(0, |s| s.as_u16()),
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError { source: err }
    }
}

/// Errors returned by the authentication realm discovery.
///
/// The error is `Clone` because one probe outcome is handed to every caller
/// that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The registry answered 401 without a usable Bearer realm challenge.
    #[error("{endpoint} didn't provide authentication information: {challenge}")]
    Discovery {
        /// Probed endpoint.
        endpoint: String,
        /// Raw `WWW-Authenticate` values, or a description of their absence.
        challenge: String,
    },

    /// The registry could not be reached.
    #[error("Cannot probe {endpoint}: {reason}")]
    Transport {
        /// Probed endpoint.
        endpoint: String,
        /// Failure reason.
        reason: String,
    },
}
