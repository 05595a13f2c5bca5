//! Error types for configuration loading, rule compilation and resolution.

use std::path::PathBuf;
use thiserror::Error;

use crate::rules::Scope;

/// Result type alias for configuration and compilation.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while reading or compiling the gateway configuration.
///
/// All of these are fatal at startup: a configuration is either compiled
/// completely or not at all.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration document is not valid JSON.
    #[error("Invalid JSON configuration: {source}")]
    Json {
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The configuration document is not valid YAML.
    #[error("Invalid YAML configuration: {source}")]
    Yaml {
        /// Underlying error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A mapping source could not be parsed as an upstream location.
    #[error("Cannot parse source '{location}' of mapping '{target}' in {scope}: {reason}")]
    InvalidSource {
        /// Scope holding the mapping.
        scope: Scope,
        /// Mapping target.
        target: String,
        /// Source location as written by the operator.
        location: String,
        /// Why parsing failed.
        reason: String,
    },

    /// A mapping has an empty target.
    #[error("Mapping with empty target in {scope} (source '{location}')")]
    EmptyTarget {
        /// Scope holding the mapping.
        scope: Scope,
        /// Source location of the offending mapping.
        location: String,
    },
}

/// Errors raised while resolving a repository name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No mount point in the selected scope owns the requested name.
    #[error("Cannot find mount point for '{name}'")]
    NoMountPoint {
        /// Requested repository name.
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_source() {
        let err = ConfigError::InvalidSource {
            scope: Scope::Vhost("mirror.local".to_string()),
            target: "cool/stuff".to_string(),
            location: "https://".to_string(),
            reason: "empty host".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("cool/stuff"));
        assert!(msg.contains("vhost 'mirror.local'"));
        assert!(msg.contains("empty host"));
    }

    #[test]
    fn test_error_display_no_mount_point() {
        let err = ResolveError::NoMountPoint {
            name: "other/thing".to_string(),
        };
        assert_eq!(err.to_string(), "Cannot find mount point for 'other/thing'");
    }
}
