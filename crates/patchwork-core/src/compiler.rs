//! Compilation of the raw configuration into [`Rules`].
//!
//! Compilation is pure: it performs no I/O and does not log. Anything the
//! operator should hear about is returned as a [`Diagnostic`] alongside the
//! compiled rules.

use std::collections::BTreeMap;
use std::fmt;

use url::Url;

use crate::config::GatewayConfig;
use crate::error::{ConfigError, Result};
use crate::rules::{MappingRules, MountPoint, RegistryId, Rules, Scope, ROOT_TARGET};

/// Output of a successful compilation.
#[derive(Debug, Clone)]
pub struct Compiled {
    /// The compiled rules.
    pub rules: Rules,
    /// Non-fatal findings, in scope order.
    pub diagnostics: Vec<Diagnostic>,
}

/// A non-fatal finding produced during compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Scope the finding applies to.
    pub scope: Scope,
    /// What was found.
    pub kind: DiagnosticKind,
}

/// Kinds of compilation findings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A root mapping is defined; every other mapping of the scope was dropped.
    RootMappingOverride {
        /// Targets that were ignored.
        ignored: Vec<String>,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DiagnosticKind::RootMappingOverride { ignored } => write!(
                f,
                "A mapping for root ('/') is defined in {}, ignoring {} other mapping(s) ({}) because it has the highest priority",
                self.scope,
                ignored.len(),
                ignored.join(", ")
            ),
        }
    }
}

/// Compiles [`GatewayConfig`] documents into [`Rules`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleCompiler;

impl RuleCompiler {
    /// Creates a new compiler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Compiles the instance scope and every virtual host scope.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any mapping is invalid. Nothing is partially
    /// applied.
    ///
    /// # Examples
    ///
    /// ```
    /// use patchwork_core::{GatewayConfig, RuleCompiler};
    ///
    /// let cfg = GatewayConfig::default()
    ///     .with_mapping("/", "registry.local/docker.io")
    ///     .with_mapping("cool/stuff", "index.docker.io/flavio");
    ///
    /// let compiled = RuleCompiler::new().compile(&cfg)?;
    /// assert_eq!(compiled.rules.instance().mappings().len(), 1);
    /// assert_eq!(compiled.diagnostics.len(), 1);
    /// # Ok::<(), patchwork_core::ConfigError>(())
    /// ```
    pub fn compile(&self, config: &GatewayConfig) -> Result<Compiled> {
        let mut diagnostics = Vec::new();

        let instance = Self::compile_scope(&Scope::Instance, &config.mappings, &mut diagnostics)?;

        let mut vhosts = BTreeMap::new();
        for (name, vhost) in &config.vhosts {
            let scope = Scope::Vhost(name.clone());
            let rules = Self::compile_scope(&scope, &vhost.mappings, &mut diagnostics)?;
            vhosts.insert(name.clone(), rules);
        }

        Ok(Compiled {
            rules: Rules { instance, vhosts },
            diagnostics,
        })
    }

    fn compile_scope(
        scope: &Scope,
        mappings: &BTreeMap<String, String>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<MappingRules> {
        let retained: Vec<(&String, &String)> = match mappings.get_key_value(ROOT_TARGET) {
            Some(root) => {
                let ignored: Vec<String> = mappings
                    .keys()
                    .filter(|target| target.as_str() != ROOT_TARGET)
                    .cloned()
                    .collect();
                if !ignored.is_empty() {
                    diagnostics.push(Diagnostic {
                        scope: scope.clone(),
                        kind: DiagnosticKind::RootMappingOverride { ignored },
                    });
                }
                vec![root]
            }
            None => mappings.iter().collect(),
        };

        let mut rules = MappingRules::default();
        for (target, location) in retained {
            if target.is_empty() {
                return Err(ConfigError::EmptyTarget {
                    scope: scope.clone(),
                    location: location.clone(),
                });
            }

            let url = parse_location(location).map_err(|reason| ConfigError::InvalidSource {
                scope: scope.clone(),
                target: target.clone(),
                location: location.clone(),
                reason,
            })?;
            let registry = RegistryId::from_url(&url).ok_or_else(|| ConfigError::InvalidSource {
                scope: scope.clone(),
                target: target.clone(),
                location: location.clone(),
                reason: "missing registry host".to_string(),
            })?;

            let mount = MountPoint {
                target: target.clone(),
                source: url.path().strip_prefix('/').unwrap_or(url.path()).to_string(),
            };

            rules
                .mount_points_by_registry
                .entry(registry)
                .or_default()
                .push(mount);
            rules.mappings.insert(target.clone(), url);
        }

        Ok(rules)
    }
}

/// Parses a mapping source, defaulting the scheme to `https`.
fn parse_location(location: &str) -> std::result::Result<Url, String> {
    let url = if location.starts_with("https://") || location.starts_with("http://") {
        Url::parse(location)
    } else {
        Url::parse(&format!("https://{location}"))
    };
    url.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(cfg: &GatewayConfig) -> Compiled {
        RuleCompiler::new().compile(cfg).unwrap()
    }

    #[test]
    fn test_compile_simple_config() {
        let cfg = GatewayConfig::from_json(
            r#"{
                "mappings" : {
                    "cool/stuff" : "index.docker.io/flavio",
                    "cool/distro" : "index.docker.io/opensuse",
                    "etcd": "quay.io/coreos/etcd"
                }
            }"#,
        )
        .unwrap();
        let compiled = compile(&cfg);
        let instance = compiled.rules.instance();

        for target in ["cool/stuff", "cool/distro", "etcd"] {
            assert!(instance.mappings().contains_key(target), "missing {target}");
        }
        assert!(compiled.diagnostics.is_empty());

        let by_registry = instance.mount_points_by_registry();
        assert_eq!(by_registry.len(), 2);

        let docker: Vec<_> = by_registry
            .iter()
            .find(|(id, _)| id.as_str() == "https://index.docker.io")
            .map(|(_, mounts)| mounts.iter().map(|m| m.source.as_str()).collect())
            .unwrap();
        assert_eq!(docker, vec!["opensuse", "flavio"]);
    }

    #[test]
    fn test_root_mapping_overrides_scope() {
        let cfg = GatewayConfig::from_json(
            r#"{
                "mappings" : {
                    "cool/stuff" : "index.docker.io/flavio",
                    "cool/distro" : "index.docker.io/opensuse",
                    "etcd": "quay.io/coreos/etcd",
                    "/": "mirror.local.lan"
                },
                "vhosts" : {
                    "docker-io-mirror.local.lan": {
                        "mappings" : {
                            "/" : "registry.local/docker.io",
                            "cool/stuff" : "index.docker.io/flavio"
                        }
                    }
                }
            }"#,
        )
        .unwrap();
        let compiled = compile(&cfg);

        let scopes = [
            compiled.rules.instance(),
            compiled.rules.vhost("docker-io-mirror.local.lan").unwrap(),
        ];
        for rules in scopes {
            assert_eq!(rules.mappings().len(), 1);
            assert!(rules.mappings().contains_key("/"));
            assert_eq!(rules.mount_points_by_registry().len(), 1);
            assert_eq!(rules.mount_points_by_registry().values().next().unwrap().len(), 1);
        }

        assert_eq!(compiled.diagnostics.len(), 2);
        assert_eq!(compiled.diagnostics[0].scope, Scope::Instance);
        assert_eq!(
            compiled.diagnostics[1].kind,
            DiagnosticKind::RootMappingOverride {
                ignored: vec!["cool/stuff".to_string()]
            }
        );
        assert!(compiled.diagnostics[0].to_string().contains("ignoring 3 other mapping(s)"));
    }

    #[test]
    fn test_root_mapping_alone_has_no_diagnostic() {
        let cfg = GatewayConfig::default().with_mapping("/", "registry.local/docker.io");
        assert!(compile(&cfg).diagnostics.is_empty());
    }

    #[test]
    fn test_vhost_config() {
        let cfg = GatewayConfig::from_json(
            r#"{
                "vhosts" : {
                    "docker-io-mirror.local.lan": { "mappings" : { "/" : "mirror.local.lan/docker.io" } },
                    "quay-io-mirror.local.lan": { "mappings" : { "/" : "mirror.local.lan/quay.io" } }
                },
                "mappings" : { "etcd": "quay.io/coreos/etcd" }
            }"#,
        )
        .unwrap();
        let rules = compile(&cfg).rules;

        assert!(rules.instance().mappings().contains_key("etcd"));
        assert_eq!(rules.vhosts().len(), 2);
        let (registry, mount) = rules
            .vhost("quay-io-mirror.local.lan")
            .unwrap()
            .root_mount()
            .unwrap();
        assert_eq!(registry.as_str(), "https://mirror.local.lan");
        assert_eq!(mount.source, "quay.io");
    }

    #[test]
    fn test_scheme_defaults_to_https_and_http_is_kept() {
        let cfg = GatewayConfig::default()
            .with_mapping("a", "registry.example")
            .with_mapping("b", "http://localhost:5000/team");
        let rules = compile(&cfg).rules;
        let ids: Vec<&str> = rules.instance().registries().map(RegistryId::as_str).collect();
        assert_eq!(ids, vec!["http://localhost:5000", "https://registry.example"]);
    }

    #[test]
    fn test_same_registry_groups_once() {
        let cfg = GatewayConfig::default()
            .with_mapping("a", "quay.io/one")
            .with_mapping("b", "https://QUAY.IO/two")
            .with_mapping("c", "quay.io:443/three");
        let rules = compile(&cfg).rules;
        let by_registry = rules.instance().mount_points_by_registry();
        assert_eq!(by_registry.len(), 1);
        assert_eq!(by_registry.values().next().unwrap().len(), 3);
    }

    #[test]
    fn test_source_without_path_is_empty() {
        let cfg = GatewayConfig::default()
            .with_mapping("a", "quay.io")
            .with_mapping("b", "quay.io/");
        let rules = compile(&cfg).rules;
        for mount in rules.instance().mount_points_by_registry().values().flatten() {
            assert_eq!(mount.source, "");
        }
    }

    #[test]
    fn test_target_kept_verbatim() {
        let cfg = GatewayConfig::default().with_mapping("/leading", "quay.io/x");
        let rules = compile(&cfg).rules;
        let mount = &rules.instance().mount_points_by_registry().values().next().unwrap()[0];
        assert_eq!(mount.target, "/leading");
        assert_eq!(mount.source, "x");
    }

    #[test]
    fn test_invalid_source_is_fatal() {
        let cfg = GatewayConfig::default()
            .with_mapping("good", "quay.io/coreos")
            .with_vhost_mapping("mirror.local", "bad", "https://");
        let err = RuleCompiler::new().compile(&cfg).unwrap_err();
        match err {
            ConfigError::InvalidSource { scope, target, .. } => {
                assert_eq!(scope, Scope::Vhost("mirror.local".to_string()));
                assert_eq!(target, "bad");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_port_is_fatal() {
        let cfg = GatewayConfig::default().with_mapping("x", "quay.io:notaport/foo");
        assert!(matches!(
            RuleCompiler::new().compile(&cfg),
            Err(ConfigError::InvalidSource { .. })
        ));
    }

    #[test]
    fn test_empty_target_is_fatal() {
        let cfg = GatewayConfig::default().with_mapping("", "quay.io/foo");
        assert!(matches!(
            RuleCompiler::new().compile(&cfg),
            Err(ConfigError::EmptyTarget { .. })
        ));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let cfg = GatewayConfig::default()
            .with_mapping("a", "quay.io/one")
            .with_mapping("b", "docker.io/two")
            .with_vhost_mapping("v", "c", "ghcr.io/three");
        assert_eq!(compile(&cfg).rules, compile(&cfg).rules);
    }
}
