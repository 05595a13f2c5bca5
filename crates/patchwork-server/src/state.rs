//! Shared request handler state.

use std::sync::Arc;

use patchwork_core::Rules;
use patchwork_registry::{AuthRealmCache, ProbeTransport, UpstreamClient};

/// State shared by every request handler.
///
/// Cloning is cheap; all members are reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Compiled mapping rules, read-only for the process lifetime.
    pub rules: Arc<Rules>,
    /// Bearer realms of the upstream registries.
    pub realms: Arc<AuthRealmCache>,
    /// Client used for catalog and tag listing.
    pub upstream: Arc<UpstreamClient>,
    /// Transport used by realm discovery.
    pub probe: Arc<dyn ProbeTransport>,
}

impl AppState {
    /// Creates the state; realm discovery probes through `upstream`.
    #[must_use]
    pub fn new(rules: Rules, upstream: UpstreamClient) -> Self {
        let realms = AuthRealmCache::new(upstream.settings().probe_timeout);
        let upstream = Arc::new(upstream);
        Self {
            rules: Arc::new(rules),
            realms: Arc::new(realms),
            probe: Arc::clone(&upstream) as Arc<dyn ProbeTransport>,
            upstream,
        }
    }

    /// Replaces the realm discovery transport.
    #[must_use]
    pub fn with_probe_transport(mut self, probe: Arc<dyn ProbeTransport>) -> Self {
        self.probe = probe;
        self
    }

    /// Replaces the realm cache.
    #[must_use]
    pub fn with_realm_cache(mut self, realms: Arc<AuthRealmCache>) -> Self {
        self.realms = realms;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("rules", &self.rules)
            .field("realms", &self.realms)
            .field("upstream", &self.upstream)
            .finish_non_exhaustive()
    }
}
