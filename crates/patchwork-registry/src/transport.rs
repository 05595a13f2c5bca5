//! The network seam used by authentication discovery.

use async_trait::async_trait;

use crate::error::RegistryError;

/// The parts of a `/v2/` probe response that discovery looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    /// HTTP status code.
    pub status: u16,
    /// Every `WWW-Authenticate` header value, in order.
    pub www_authenticate: Vec<String>,
}

impl ProbeResponse {
    /// Creates a response without authentication headers.
    #[must_use]
    pub const fn new(status: u16) -> Self {
        Self {
            status,
            www_authenticate: Vec::new(),
        }
    }

    /// Adds a `WWW-Authenticate` header value.
    #[must_use]
    pub fn with_www_authenticate(mut self, value: impl Into<String>) -> Self {
        self.www_authenticate.push(value.into());
        self
    }
}

/// Performs the unauthenticated GET used to probe a registry.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    /// Sends `GET url` and returns the status and challenge headers.
    async fn probe(&self, url: &str) -> Result<ProbeResponse, RegistryError>;
}
