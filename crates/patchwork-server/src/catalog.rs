//! Merging of upstream catalogs into the client namespace.

use std::collections::BTreeSet;

use patchwork_core::{resolve, MappingRules, MountPoint, RegistryId};

/// Maps an upstream repository back to the name a client would request.
///
/// The candidate is kept only if resolving it leads back to the same
/// upstream repository, so a longer competing mount point never makes the
/// catalog list a name that would be served from somewhere else.
#[must_use]
pub fn client_name(
    rules: &MappingRules,
    registry: &RegistryId,
    mount: &MountPoint,
    repository: &str,
) -> Option<String> {
    let candidate = if rules.has_root_mapping() {
        if mount.source.is_empty() {
            repository.to_string()
        } else {
            repository
                .strip_prefix(mount.source.as_str())?
                .strip_prefix('/')?
                .to_string()
        }
    } else {
        if mount.source.is_empty() {
            return None;
        }
        let rest = repository.strip_prefix(mount.source.as_str())?;
        format!("{}{rest}", mount.target)
    };

    let resolution = resolve(rules, &candidate).ok()?;
    (resolution.registry == *registry && resolution.remote_name == repository).then_some(candidate)
}

/// Renames the repositories listed by `registry` into the client namespace.
pub fn merge_into(
    catalog: &mut BTreeSet<String>,
    rules: &MappingRules,
    registry: &RegistryId,
    mounts: &[MountPoint],
    repositories: &[String],
) {
    for repository in repositories {
        for mount in mounts {
            if let Some(name) = client_name(rules, registry, mount, repository) {
                catalog.insert(name);
            }
        }
    }
}
