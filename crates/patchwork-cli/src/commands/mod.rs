//! CLI commands and argument parsing.

pub mod check;
pub mod serve;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use patchwork_core::{Compiled, GatewayConfig, RuleCompiler};

/// Patchwork - read-only registry made of repositories from multiple upstream registries
#[derive(Parser)]
#[command(name = "patchwork")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable extra debugging
    #[arg(short, long, global = true, env = "PATCHWORK_DEBUG")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the registry gateway
    Serve(serve::ServeArgs),

    /// Validate a configuration and print the compiled mount points
    Check(check::CheckArgs),

    /// Print version information
    Version,
}

/// Where the mapping configuration comes from.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// JSON configuration
    #[arg(
        short,
        long,
        env = "PATCHWORK_CONFIG",
        conflicts_with = "config_file",
        required_unless_present = "config_file"
    )]
    pub config: Option<String>,

    /// Configuration file (JSON, or YAML with a .yaml/.yml extension)
    #[arg(long, env = "PATCHWORK_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,
}

impl ConfigArgs {
    /// Loads the configuration document.
    pub fn load(&self) -> Result<GatewayConfig> {
        match (&self.config, &self.config_file) {
            (Some(data), None) => {
                GatewayConfig::from_json(data).context("Failed to parse --config")
            }
            (None, Some(path)) => GatewayConfig::from_file(path)
                .with_context(|| format!("Failed to load {}", path.display())),
            (Some(_), Some(_)) => {
                anyhow::bail!("'--config-file' and '--config' cannot be specified at the same time")
            }
            (None, None) => anyhow::bail!("You must specify either '--config-file' or '--config'"),
        }
    }

    /// Loads and compiles the configuration.
    pub fn compile(&self) -> Result<Compiled> {
        let config = self.load()?;
        RuleCompiler::new()
            .compile(&config)
            .context("Invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_args(config: Option<&str>, config_file: Option<PathBuf>) -> ConfigArgs {
        ConfigArgs {
            config: config.map(ToString::to_string),
            config_file,
        }
    }

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["patchwork", "serve", "--config", "{}"]).unwrap();
        assert!(!cli.debug);
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, 5000);
        assert_eq!(args.bind.to_string(), "0.0.0.0");
        assert_eq!(args.probe_timeout, 10);
        assert_eq!(args.upstream_timeout, 30);
        assert!(args.socket.is_none());
    }

    #[test]
    fn test_parse_global_debug() {
        let cli = Cli::try_parse_from(["patchwork", "serve", "-c", "{}", "-d"]).unwrap();
        assert!(cli.debug);
    }

    #[test]
    fn test_config_sources_conflict() {
        let result = Cli::try_parse_from([
            "patchwork",
            "check",
            "--config",
            "{}",
            "--config-file",
            "patchwork.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_source_required() {
        assert!(Cli::try_parse_from(["patchwork", "check"]).is_err());
    }

    #[test]
    fn test_cert_requires_key() {
        let result = Cli::try_parse_from([
            "patchwork",
            "serve",
            "-c",
            "{}",
            "--cert",
            "cert.pem",
        ]);
        assert!(result.is_err());

        let result = Cli::try_parse_from([
            "patchwork",
            "serve",
            "-c",
            "{}",
            "--cert",
            "cert.pem",
            "--key",
            "key.pem",
        ]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_load_inline() {
        let cfg = config_args(Some(r#"{"mappings": {"etcd": "quay.io/coreos/etcd"}}"#), None)
            .load()
            .unwrap();
        assert_eq!(cfg.mappings.len(), 1);
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patchwork.yaml");
        std::fs::write(&path, "mappings:\n  etcd: quay.io/coreos/etcd\n").unwrap();

        let compiled = config_args(None, Some(path)).compile().unwrap();
        assert_eq!(compiled.rules.instance().mappings().len(), 1);
    }

    #[test]
    fn test_load_requires_one_source() {
        let err = config_args(None, None).load().unwrap_err();
        assert!(err.to_string().contains("either"));

        let err = config_args(Some("{}"), Some(PathBuf::from("x.json")))
            .load()
            .unwrap_err();
        assert!(err.to_string().contains("same time"));
    }

    #[test]
    fn test_compile_rejects_invalid_mapping() {
        let err = config_args(Some(r#"{"mappings": {"": "quay.io/x"}}"#), None)
            .compile()
            .unwrap_err();
        assert!(err.to_string().contains("Invalid configuration"));
    }
}
