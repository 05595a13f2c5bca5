//! Serve command implementation.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use patchwork_registry::{UpstreamClient, UpstreamSettings};
use patchwork_server::{create_router, load_tls_config, serve, AppState, Endpoint};

use super::ConfigArgs;

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Directory of extra PEM certificates trusted for upstream registries
    #[arg(long, env = "PATCHWORK_EXTRA_CERTS_DIR")]
    pub extra_certs_dir: Option<PathBuf>,

    /// Path to the certificate to use
    #[arg(long, env = "PATCHWORK_CERTIFICATE", requires = "key")]
    pub cert: Option<PathBuf>,

    /// Path to the key to use
    #[arg(long, env = "PATCHWORK_KEY", requires = "cert")]
    pub key: Option<PathBuf>,

    /// Listen to port
    #[arg(short, long, env = "PATCHWORK_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Address to listen on
    #[arg(long, env = "PATCHWORK_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Bind to a unix socket instead of a TCP port
    #[arg(long, env = "PATCHWORK_SOCKET", conflicts_with_all = ["cert", "key"])]
    pub socket: Option<PathBuf>,

    /// Timeout of upstream authentication probes, in seconds
    #[arg(long, env = "PATCHWORK_PROBE_TIMEOUT", default_value_t = 10)]
    pub probe_timeout: u64,

    /// Timeout of upstream catalog and tag requests, in seconds
    #[arg(long, env = "PATCHWORK_UPSTREAM_TIMEOUT", default_value_t = 30)]
    pub upstream_timeout: u64,
}

impl ServeArgs {
    fn upstream_settings(&self) -> UpstreamSettings {
        let settings = UpstreamSettings::new()
            .with_timeout(Duration::from_secs(self.upstream_timeout))
            .with_probe_timeout(Duration::from_secs(self.probe_timeout));
        match &self.extra_certs_dir {
            Some(dir) => settings.with_extra_certs_dir(dir),
            None => settings,
        }
    }

    fn endpoint(&self) -> Result<Endpoint> {
        if let Some(socket) = &self.socket {
            #[cfg(unix)]
            return Ok(Endpoint::Unix(socket.clone()));
            #[cfg(not(unix))]
            anyhow::bail!("Unix sockets are not supported on this platform: {}", socket.display());
        }

        let addr = SocketAddr::new(self.bind, self.port);
        match (&self.cert, &self.key) {
            (Some(cert), Some(key)) => Ok(Endpoint::Tls {
                addr,
                config: load_tls_config(cert, key).context("Failed to load TLS certificate")?,
            }),
            (None, None) => Ok(Endpoint::Tcp(addr)),
            _ => anyhow::bail!("cert and key have to be specified at the same time"),
        }
    }
}

/// Runs the serve command.
///
/// # Errors
///
/// Returns an error if:
/// - The configuration cannot be loaded or compiled
/// - The extra certificates or the TLS material cannot be loaded
/// - The listener cannot be bound
pub async fn run(args: ServeArgs) -> Result<()> {
    let compiled = args.config.compile()?;
    for diagnostic in &compiled.diagnostics {
        warn!("{diagnostic}");
    }

    let upstream = UpstreamClient::new(args.upstream_settings())
        .context("Failed to create upstream client")?;
    let endpoint = args.endpoint()?;

    let state = AppState::new(compiled.rules, upstream);
    info!(
        registries = state.rules.instance().registries().count(),
        vhosts = state.rules.vhosts().len(),
        "Mapping rules loaded"
    );

    serve(endpoint, create_router(state), shutdown_signal())
        .await
        .context("Server error")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutting down");
}
