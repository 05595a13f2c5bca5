//! Gateway configuration document.
//!
//! The document carries an instance-level mapping table and an optional set
//! of virtual hosts, each with its own mapping table:
//!
//! ```json
//! {
//!   "mappings": { "cool/stuff": "index.docker.io/flavio" },
//!   "vhosts": {
//!     "docker-io-mirror.local.lan": {
//!       "mappings": { "/": "mirror.local.lan/docker.io" }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Raw gateway configuration, as written by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Instance-level mappings (target prefix → source location).
    pub mappings: BTreeMap<String, String>,

    /// Per virtual host mappings, keyed by host name.
    pub vhosts: BTreeMap<String, VhostConfig>,
}

/// Mapping table of a single virtual host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VhostConfig {
    /// Mappings (target prefix → source location).
    pub mappings: BTreeMap<String, String>,
}

impl GatewayConfig {
    /// Parses a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON or has an
    /// unexpected shape.
    ///
    /// # Examples
    ///
    /// ```
    /// use patchwork_core::GatewayConfig;
    ///
    /// let cfg = GatewayConfig::from_json(r#"{"mappings": {"etcd": "quay.io/coreos/etcd"}}"#)?;
    /// assert_eq!(cfg.mappings["etcd"], "quay.io/coreos/etcd");
    /// # Ok::<(), patchwork_core::ConfigError>(())
    /// ```
    pub fn from_json(data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(|source| ConfigError::Json { source })
    }

    /// Parses a YAML configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid YAML or has an
    /// unexpected shape.
    pub fn from_yaml(data: &str) -> Result<Self> {
        serde_yaml::from_str(data).map_err(|source| ConfigError::Yaml { source })
    }

    /// Reads a configuration file.
    ///
    /// Files ending in `.yaml` or `.yml` are parsed as YAML, anything else as
    /// JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml(&data),
            _ => Self::from_json(&data),
        }
    }

    /// Adds an instance-level mapping.
    #[must_use]
    pub fn with_mapping(mut self, target: impl Into<String>, location: impl Into<String>) -> Self {
        self.mappings.insert(target.into(), location.into());
        self
    }

    /// Adds a mapping to a virtual host, creating the host if needed.
    #[must_use]
    pub fn with_vhost_mapping(
        mut self,
        vhost: impl Into<String>,
        target: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        self.vhosts
            .entry(vhost.into())
            .or_default()
            .mappings
            .insert(target.into(), location.into());
        self
    }
}
