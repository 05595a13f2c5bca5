//! # Patchwork Server
//!
//! The registry v2 HTTP surface of the Patchwork gateway.
//!
//! Clients pull through Patchwork as if it were a single registry. Manifest
//! and blob requests are redirected to the upstream registry that owns the
//! repository, tag lists are fetched and returned under the client's name,
//! and the catalog merges every upstream of the selected scope.
//!
//! ## Example
//!
//! ```rust,no_run
//! use patchwork_core::{GatewayConfig, RuleCompiler};
//! use patchwork_registry::{UpstreamClient, UpstreamSettings};
//! use patchwork_server::{create_router, serve, AppState, Endpoint};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = GatewayConfig::from_json(r#"{"mappings": {"etcd": "quay.io/coreos/etcd"}}"#)?;
//! let rules = RuleCompiler::new().compile(&cfg)?.rules;
//! let state = AppState::new(rules, UpstreamClient::new(UpstreamSettings::new())?);
//!
//! serve(Endpoint::Tcp("0.0.0.0:5000".parse()?), create_router(state), async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod error;
pub mod listener;
pub mod middleware;
pub mod oci;
pub mod reference;
pub mod routes;
pub mod state;

pub use error::{Result, ServerError};
pub use listener::{load_tls_config, serve, Endpoint};
pub use oci::{ApiError, ErrorCode};
pub use routes::create_router;
pub use state::AppState;
