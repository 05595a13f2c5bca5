//! Translation of client repository names into upstream locations.

use std::cmp::Ordering;

use crate::error::ResolveError;
use crate::rules::{MappingRules, MountPoint, RegistryId};

/// Where a requested repository actually lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Upstream registry owning the repository.
    pub registry: RegistryId,
    /// Repository name on the upstream registry.
    pub remote_name: String,
}

impl Resolution {
    /// Builds the upstream URL for a path below `/v2/<remote_name>/`.
    ///
    /// ```
    /// # use patchwork_core::{GatewayConfig, RuleCompiler, resolve};
    /// let cfg = GatewayConfig::default().with_mapping("etcd", "quay.io/coreos/etcd");
    /// let rules = RuleCompiler::new().compile(&cfg)?.rules;
    /// let resolution = resolve(rules.instance(), "etcd").unwrap();
    /// assert_eq!(
    ///     resolution.upstream_url("manifests/latest"),
    ///     "https://quay.io/v2/coreos/etcd/manifests/latest"
    /// );
    /// # Ok::<(), patchwork_core::ConfigError>(())
    /// ```
    #[must_use]
    pub fn upstream_url(&self, suffix: &str) -> String {
        self.registry
            .endpoint(&format!("v2/{}/{}", self.remote_name, suffix.trim_start_matches('/')))
    }
}

/// Resolves `name` against the rules of one scope.
///
/// A root mapping, when present, owns every name: the result is the root
/// source joined with `name`. Otherwise the mount point with the longest
/// target that prefixes `name` wins, and its target is replaced by its
/// source. Equal-length candidates are ordered by target, then by registry
/// identity, so the outcome never depends on map iteration order. Targets are
/// unique keys within a scope, so in practice only the length comparison
/// decides between mount points of one scope.
///
/// # Errors
///
/// Returns [`ResolveError::NoMountPoint`] when nothing in the scope owns
/// `name`.
pub fn resolve(rules: &MappingRules, name: &str) -> Result<Resolution, ResolveError> {
    if let Some((registry, mount)) = rules.root_mount() {
        let remote_name = if mount.source.is_empty() {
            name.to_string()
        } else {
            format!("{}/{name}", mount.source)
        };
        return Ok(Resolution {
            registry: registry.clone(),
            remote_name,
        });
    }

    let winner = rules
        .mount_points_by_registry()
        .iter()
        .flat_map(|(registry, mounts)| mounts.iter().map(move |mount| (registry, mount)))
        .filter(|(_, mount)| name.starts_with(mount.target.as_str()))
        .min_by(|a, b| precedence(*a, *b));

    match winner {
        Some((registry, mount)) if !mount.source.is_empty() => Ok(Resolution {
            registry: registry.clone(),
            remote_name: name.replacen(mount.target.as_str(), &mount.source, 1),
        }),
        _ => Err(ResolveError::NoMountPoint {
            name: name.to_string(),
        }),
    }
}

/// Orders candidates so the preferred one compares smallest.
fn precedence(a: (&RegistryId, &MountPoint), b: (&RegistryId, &MountPoint)) -> Ordering {
    b.1.target
        .len()
        .cmp(&a.1.target.len())
        .then_with(|| a.1.target.cmp(&b.1.target))
        .then_with(|| a.0.cmp(b.0))
}
