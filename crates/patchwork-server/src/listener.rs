//! Listening sockets: plain TCP, TLS and unix domain sockets.

use std::fs::File;
use std::future::Future;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use rustls::ServerConfig;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use crate::error::{Result, ServerError};

/// Where the gateway accepts connections.
#[derive(Clone)]
pub enum Endpoint {
    /// Plain HTTP over TCP.
    Tcp(SocketAddr),
    /// HTTPS over TCP.
    Tls {
        /// Listening address.
        addr: SocketAddr,
        /// Server certificate and key.
        config: Arc<ServerConfig>,
    },
    /// Plain HTTP over a unix domain socket, removed on shutdown.
    #[cfg(unix)]
    Unix(PathBuf),
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp(addr) => f.debug_tuple("Tcp").field(addr).finish(),
            Self::Tls { addr, .. } => f
                .debug_struct("Tls")
                .field("addr", addr)
                .finish_non_exhaustive(),
            #[cfg(unix)]
            Self::Unix(path) => f.debug_tuple("Unix").field(path).finish(),
        }
    }
}

/// Loads a PEM certificate chain and private key for the TLS listener.
///
/// # Errors
///
/// Returns an error if a file cannot be read, holds no usable PEM item, or
/// the key does not match the certificate.
pub fn load_tls_config(cert: &Path, key: &Path) -> Result<Arc<ServerConfig>> {
    let tls_error = |path: &Path, message: String| ServerError::Tls {
        path: path.to_path_buf(),
        message,
    };

    let mut reader = BufReader::new(File::open(cert).map_err(|e| tls_error(cert, e.to_string()))?);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| tls_error(cert, e.to_string()))?;
    if certs.is_empty() {
        return Err(tls_error(cert, "no certificate found".to_string()));
    }

    let mut reader = BufReader::new(File::open(key).map_err(|e| tls_error(key, e.to_string()))?);
    let private_key = rustls_pemfile::private_key(&mut reader)
        .map_err(|e| tls_error(key, e.to_string()))?
        .ok_or_else(|| tls_error(key, "no private key found".to_string()))?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| tls_error(cert, e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, private_key)
        .map_err(|e| tls_error(key, e.to_string()))?;

    Ok(Arc::new(config))
}

/// Serves `router` on `endpoint` until `shutdown` completes.
///
/// # Errors
///
/// Returns an error if the endpoint cannot be bound or the accept loop fails.
pub async fn serve<F>(endpoint: Endpoint, router: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    match endpoint {
        Endpoint::Tcp(addr) => {
            let listener = bind_tcp(addr).await?;
            info!("Listening on http://{addr}");
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
                .map_err(|source| ServerError::Io { source })
        }
        Endpoint::Tls { addr, config } => {
            let listener = bind_tcp(addr).await?;
            info!("Listening on https://{addr}");
            serve_tls(listener, TlsAcceptor::from(config), router, shutdown).await;
            Ok(())
        }
        #[cfg(unix)]
        Endpoint::Unix(path) => serve_unix(&path, router, shutdown).await,
    }
}

async fn bind_tcp(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            address: addr.to_string(),
            source,
        })
}

async fn serve_tls<F>(listener: TcpListener, acceptor: TlsAcceptor, router: Router, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::pin!(shutdown);
    loop {
        let (stream, peer) = tokio::select! {
            () = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            },
        };

        let acceptor = acceptor.clone();
        let router = router.clone();
        tokio::spawn(async move {
            match acceptor.accept(stream).await {
                Ok(stream) => serve_connection(stream, router).await,
                Err(e) => debug!(%peer, error = %e, "TLS handshake failed"),
            }
        });
    }
    info!("Listener stopped");
}

#[cfg(unix)]
async fn serve_unix<F>(path: &Path, router: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if path.exists() {
        return Err(ServerError::SocketInUse {
            path: path.to_path_buf(),
        });
    }

    let listener = tokio::net::UnixListener::bind(path).map_err(|source| ServerError::Bind {
        address: path.display().to_string(),
        source,
    })?;
    info!(socket = %path.display(), "Listening on unix socket");

    tokio::pin!(shutdown);
    loop {
        let stream = tokio::select! {
            () = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            },
        };
        tokio::spawn(serve_connection(stream, router.clone()));
    }

    drop(listener);
    if let Err(e) = std::fs::remove_file(path) {
        warn!(socket = %path.display(), error = %e, "Cannot remove socket");
    }
    info!("Listener stopped");
    Ok(())
}

async fn serve_connection<S>(stream: S, router: Router)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = TowerToHyperService::new(router);
    if let Err(e) = auto::Builder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        debug!(error = %e, "Connection closed with error");
    }
}
