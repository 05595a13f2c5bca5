//! Settings shared by every upstream request.

use std::path::PathBuf;
use std::time::Duration;

/// Default timeout of a single upstream request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout of an authentication probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for talking to upstream registries.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// Request timeout for catalog and tag listing.
    pub timeout: Duration,

    /// Timeout for `/v2/` authentication probes.
    pub probe_timeout: Duration,

    /// Directory of extra PEM certificates trusted on top of the system roots.
    pub extra_certs_dir: Option<PathBuf>,

    /// User agent string.
    pub user_agent: String,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl UpstreamSettings {
    /// Creates settings with default timeouts and no extra certificates.
    ///
    /// # Examples
    ///
    /// ```
    /// use patchwork_registry::UpstreamSettings;
    /// use std::time::Duration;
    ///
    /// let settings = UpstreamSettings::new();
    /// assert_eq!(settings.probe_timeout, Duration::from_secs(10));
    /// assert!(settings.extra_certs_dir.is_none());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            extra_certs_dir: None,
            user_agent: format!("patchwork/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the probe timeout.
    #[must_use]
    pub const fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets the directory of extra PEM certificates.
    #[must_use]
    pub fn with_extra_certs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.extra_certs_dir = Some(dir.into());
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
