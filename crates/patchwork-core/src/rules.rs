//! Compiled mapping rules.
//!
//! [`Rules`] is produced once by the [`RuleCompiler`](crate::RuleCompiler)
//! and never mutated afterwards, so it can be shared freely between request
//! handlers.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use url::Url;

/// Target of the root mapping.
pub const ROOT_TARGET: &str = "/";

/// Canonical identity of an upstream registry: `scheme://host[:port]`.
///
/// Two mappings pointing at the same upstream always produce equal
/// identities, so grouping and caching by `RegistryId` never splits one
/// registry into several keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RegistryId(String);

impl RegistryId {
    /// Derives the identity of the registry serving `url`.
    ///
    /// Returns `None` when the URL has no host.
    ///
    /// # Examples
    ///
    /// ```
    /// use patchwork_core::RegistryId;
    /// use url::Url;
    ///
    /// let url = Url::parse("https://Quay.io:443/coreos/etcd").unwrap();
    /// let id = RegistryId::from_url(&url).unwrap();
    /// assert_eq!(id.as_str(), "https://quay.io");
    /// ```
    #[must_use]
    pub fn from_url(url: &Url) -> Option<Self> {
        let host = url.host_str().filter(|h| !h.is_empty())?;
        let id = match url.port() {
            Some(port) => format!("{}://{host}:{port}", url.scheme()),
            None => format!("{}://{host}", url.scheme()),
        };
        Some(Self(id))
    }

    /// Returns the identity string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds an absolute URL on this registry.
    ///
    /// ```
    /// use patchwork_core::RegistryId;
    /// use url::Url;
    ///
    /// let id = RegistryId::from_url(&Url::parse("https://quay.io").unwrap()).unwrap();
    /// assert_eq!(id.endpoint("/v2/"), "https://quay.io/v2/");
    /// ```
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_start_matches('/'))
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RegistryId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compiled form of a mapping.
///
/// Given `cool/stuff` → `index.docker.io/flavio`, the target is `cool/stuff`
/// and the source is `flavio` on registry `https://index.docker.io`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct MountPoint {
    /// Prefix clients see, exactly as configured.
    pub target: String,

    /// Prefix on the upstream registry. Never starts with `/`.
    pub source: String,
}

/// Which mapping table governs a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Instance-level default mappings.
    Instance,
    /// Mappings of a named virtual host.
    Vhost(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance => f.write_str("instance mappings"),
            Self::Vhost(name) => write!(f, "vhost '{name}'"),
        }
    }
}

/// Mapping rules of a single scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingRules {
    pub(crate) mappings: BTreeMap<String, Url>,
    pub(crate) mount_points_by_registry: BTreeMap<RegistryId, Vec<MountPoint>>,
}

impl MappingRules {
    /// Parsed source location of every retained mapping, keyed by target.
    #[must_use]
    pub const fn mappings(&self) -> &BTreeMap<String, Url> {
        &self.mappings
    }

    /// Mount points grouped by upstream registry.
    #[must_use]
    pub const fn mount_points_by_registry(&self) -> &BTreeMap<RegistryId, Vec<MountPoint>> {
        &self.mount_points_by_registry
    }

    /// Returns true if this scope has a root (`/`) mapping.
    #[must_use]
    pub fn has_root_mapping(&self) -> bool {
        self.mappings.contains_key(ROOT_TARGET)
    }

    /// Returns the registry and mount point of the root mapping, if any.
    ///
    /// A scope with a root mapping holds exactly one registry with exactly one
    /// mount point.
    #[must_use]
    pub fn root_mount(&self) -> Option<(&RegistryId, &MountPoint)> {
        if !self.has_root_mapping() {
            return None;
        }
        self.mount_points_by_registry
            .iter()
            .find_map(|(registry, mounts)| mounts.first().map(|mp| (registry, mp)))
    }

    /// Iterates over the upstream registries referenced by this scope.
    pub fn registries(&self) -> impl Iterator<Item = &RegistryId> {
        self.mount_points_by_registry.keys()
    }

    /// Returns true if the scope has no mappings at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

/// The complete compiled configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rules {
    pub(crate) instance: MappingRules,
    pub(crate) vhosts: BTreeMap<String, MappingRules>,
}

impl Rules {
    /// Instance-level rules.
    #[must_use]
    pub const fn instance(&self) -> &MappingRules {
        &self.instance
    }

    /// Rules of every virtual host.
    #[must_use]
    pub const fn vhosts(&self) -> &BTreeMap<String, MappingRules> {
        &self.vhosts
    }

    /// Returns the rules of a virtual host, if it is configured.
    #[must_use]
    pub fn vhost(&self, host: &str) -> Option<&MappingRules> {
        self.vhosts.get(host)
    }

    /// Selects the rules that govern a request addressed to `host`.
    ///
    /// Falls back to the instance rules for any host that is not a
    /// configured virtual host.
    #[must_use]
    pub fn select(&self, host: &str) -> &MappingRules {
        self.vhosts.get(host).unwrap_or(&self.instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GatewayConfig, RuleCompiler};

    fn id(url: &str) -> RegistryId {
        RegistryId::from_url(&Url::parse(url).unwrap()).unwrap()
    }

    #[test]
    fn test_registry_id_canonical() {
        assert_eq!(id("https://quay.io/coreos/etcd"), id("https://QUAY.io/"));
        assert_eq!(id("https://quay.io:443").as_str(), "https://quay.io");
        assert_eq!(id("http://localhost:5000/foo").as_str(), "http://localhost:5000");
    }

    #[test]
    fn test_registry_id_without_host() {
        let url = Url::parse("file:///tmp/registry").unwrap();
        assert!(RegistryId::from_url(&url).is_none());
    }

    #[test]
    fn test_select_falls_back_to_instance() {
        let cfg = GatewayConfig::default()
            .with_mapping("cool/stuff", "index.docker.io/flavio")
            .with_vhost_mapping("mirror.local", "/", "registry.local/docker.io");
        let rules = RuleCompiler::new().compile(&cfg).unwrap().rules;

        assert!(rules.select("mirror.local").has_root_mapping());
        assert_eq!(rules.select("mirror.local"), rules.vhost("mirror.local").unwrap());
        assert_eq!(rules.select("other.local"), rules.instance());
        assert_eq!(rules.select(""), rules.instance());
    }

    #[test]
    fn test_root_mount() {
        let cfg = GatewayConfig::default().with_mapping("/", "registry.local/docker.io");
        let rules = RuleCompiler::new().compile(&cfg).unwrap().rules;

        let (registry, mount) = rules.instance().root_mount().unwrap();
        assert_eq!(registry.as_str(), "https://registry.local");
        assert_eq!(mount.source, "docker.io");
        assert_eq!(mount.target, "/");
    }

    #[test]
    fn test_root_mount_absent() {
        let cfg = GatewayConfig::default().with_mapping("etcd", "quay.io/coreos/etcd");
        let rules = RuleCompiler::new().compile(&cfg).unwrap().rules;
        assert!(rules.instance().root_mount().is_none());
    }
}
