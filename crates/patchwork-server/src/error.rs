//! Error types for the gateway server.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that prevent the server from starting or serving.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening address could not be bound.
    #[error("Cannot listen on {address}: {source}")]
    Bind {
        /// Address or socket path.
        address: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A unix socket file is already present.
    #[error("Cannot create socket {path}, file already in place. Is another instance already running?")]
    SocketInUse {
        /// Socket path.
        path: PathBuf,
    },

    /// The TLS certificate or key cannot be used.
    #[error("Invalid TLS material {path}: {message}")]
    Tls {
        /// Certificate or key file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// The server stopped because of an I/O failure.
    #[error("Server I/O error: {source}")]
    Io {
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
