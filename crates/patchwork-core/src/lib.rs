//! # Patchwork Core
//!
//! Mapping rules for the Patchwork registry gateway.
//!
//! Patchwork exposes one virtual registry namespace whose repositories live
//! on several upstream registries. This crate turns the operator's mapping
//! tables into immutable [`Rules`] and answers, for every request, which
//! upstream registry and repository a client name refers to.
//!
//! - [`GatewayConfig`] - the raw configuration document
//! - [`RuleCompiler`] - validates and compiles it into [`Rules`]
//! - [`Rules::select`] - picks the scope (virtual host or instance default)
//! - [`resolve`] - longest-prefix name translation with root override
//!
//! ## Example
//!
//! ```rust
//! use patchwork_core::{resolve, GatewayConfig, RuleCompiler};
//!
//! let cfg = GatewayConfig::from_json(r#"{
//!     "mappings": { "cool/stuff": "index.docker.io/flavio" },
//!     "vhosts": { "mirror.local": { "mappings": { "/": "registry.local/docker.io" } } }
//! }"#)?;
//!
//! let rules = RuleCompiler::new().compile(&cfg)?.rules;
//!
//! let resolution = resolve(rules.select("gateway.local"), "cool/stuff/busybox").unwrap();
//! assert_eq!(resolution.registry.as_str(), "https://index.docker.io");
//! assert_eq!(resolution.remote_name, "flavio/busybox");
//!
//! let resolution = resolve(rules.select("mirror.local"), "busybox").unwrap();
//! assert_eq!(resolution.remote_name, "docker.io/busybox");
//! # Ok::<(), patchwork_core::ConfigError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod compiler;
pub mod config;
pub mod error;
pub mod resolver;
pub mod rules;


pub use compiler::{Compiled, Diagnostic, DiagnosticKind, RuleCompiler};
pub use config::{GatewayConfig, VhostConfig};
pub use error::{ConfigError, ResolveError, Result};
pub use resolver::{resolve, Resolution};
pub use rules::{MappingRules, MountPoint, RegistryId, Rules, Scope, ROOT_TARGET};
