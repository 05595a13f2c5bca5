//! Patchwork CLI - a read-only registry assembled from repositories of several upstream registries.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "patchwork=debug"
    } else {
        "patchwork=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve(args) => commands::serve::run(args).await,
        Commands::Check(args) => commands::check::run(&args),
        Commands::Version => {
            println!("patchwork {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
