//! Registry v2 error envelope.
//!
//! Every failure is reported as
//! `{"errors":[{"code":..,"message":..,"detail":..}]}` so that container
//! clients can show a meaningful message.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

/// Header advertising the registry protocol version.
pub const API_VERSION_HEADER: &str = "Docker-Distribution-Api-Version";

/// Value of [`API_VERSION_HEADER`].
pub const API_VERSION: &str = "registry/2.0";

/// Registry error codes emitted by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The repository name is not mapped.
    NameUnknown,
    /// The manifest's repository name is not mapped.
    ManifestUnknown,
    /// The blob's repository name is not mapped.
    BlobUnknown,
    /// The repository name does not follow the reference grammar.
    NameInvalid,
    /// The digest does not follow the digest grammar.
    DigestInvalid,
    /// The manifest reference is neither a tag nor a digest.
    ManifestInvalid,
    /// The client must authenticate.
    Unauthorized,
    /// The operation is not offered by the gateway.
    Unsupported,
    /// Any other failure.
    Unknown,
}

impl ErrorCode {
    /// Returns the canonical message of the code.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NameUnknown => "repository name not known to registry",
            Self::ManifestUnknown => "manifest unknown",
            Self::BlobUnknown => "blob unknown to registry",
            Self::NameInvalid => "invalid repository name",
            Self::DigestInvalid => "provided digest did not match uploaded content",
            Self::ManifestInvalid => "manifest invalid",
            Self::Unauthorized => "authentication required",
            Self::Unsupported => "The operation is unsupported.",
            Self::Unknown => "unknown error",
        }
    }

    /// Returns the status code normally paired with the code.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::NameUnknown
            | Self::ManifestUnknown
            | Self::BlobUnknown
            | Self::NameInvalid
            | Self::DigestInvalid
            | Self::ManifestInvalid => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Unsupported => StatusCode::METHOD_NOT_ALLOWED,
            Self::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    errors: [ErrorEntry; 1],
}

#[derive(Debug, Serialize)]
struct ErrorEntry {
    code: ErrorCode,
    message: &'static str,
    detail: Value,
}

/// A registry error ready to be sent to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    code: ErrorCode,
    status: StatusCode,
    detail: Value,
}

impl ApiError {
    /// Creates an error with the code's default status and no detail.
    #[must_use]
    pub const fn new(code: ErrorCode) -> Self {
        Self {
            code,
            status: code.status(),
            detail: Value::Null,
        }
    }

    /// Attaches a detail value.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<Value>) -> Self {
        self.detail = detail.into();
        self
    }

    /// Returns the HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ErrorCode> for ApiError {
    fn from(code: ErrorCode) -> Self {
        Self::new(code)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            errors: [ErrorEntry {
                code: self.code,
                message: self.code.message(),
                detail: self.detail,
            }],
        };
        let mut response = (self.status, Json(body)).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        response
    }
}
