//! # Patchwork Registry
//!
//! Access to the upstream registries behind a Patchwork gateway.
//!
//! - [`UpstreamClient`] - catalog and tag listing with anonymous token auth
//! - [`AuthRealmCache`] - memoized, single-flight Bearer realm discovery
//! - [`load_extra_certs`] - private CAs trusted on top of the system roots
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use patchwork_core::RegistryId;
//! use patchwork_registry::{AuthRealmCache, ProbeTransport, UpstreamClient, UpstreamSettings};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = UpstreamSettings::new();
//! let cache = AuthRealmCache::new(settings.probe_timeout);
//! let client: Arc<dyn ProbeTransport> = Arc::new(UpstreamClient::new(settings)?);
//!
//! let quay = RegistryId::from_url(&"https://quay.io".parse()?).ok_or("no host")?;
//! let realm = cache.realm_for(&quay, &client).await?;
//! println!("quay.io realm: {realm:?}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod challenge;
pub mod client;
pub mod config;
pub mod error;
pub mod realm;
pub mod tls;
pub mod transport;

pub use challenge::BearerChallenge;
pub use client::UpstreamClient;
pub use config::{UpstreamSettings, DEFAULT_PROBE_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
pub use error::{AuthError, RegistryError};
pub use realm::AuthRealmCache;
pub use tls::load_extra_certs;
pub use transport::{ProbeResponse, ProbeTransport};
