//! pinbus-server - standalone relay daemon binary.
//!
//! Loads the TOML configuration, seeds the in-memory token registry from
//! it, binds both listeners, and serves until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pinbus_core::{AccountId, DashId, ServerConfig};
use pinbus_server::registry::{AcceptAllReceipts, NoopNotifier, TokenRegistry};
use pinbus_server::server::RelayServer;
use pinbus_server::storage::InMemoryStorage;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// pinbus relay - token-authenticated device/app relay
#[derive(Parser, Debug)]
#[command(name = "pinbus-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to TOML configuration file; defaults apply when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter (overridable via RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ServerConfig::default(),
    };

    let registry = TokenRegistry::new();
    for seed in &config.tokens {
        registry.insert(
            seed.token.clone(),
            AccountId::new(seed.account.clone()),
            DashId(seed.dash_id),
        );
    }
    info!(tokens = config.tokens.len(), "token registry seeded");

    let server = RelayServer::bind(
        &config,
        Arc::new(registry),
        Arc::new(InMemoryStorage::new()),
        Arc::new(AcceptAllReceipts),
        Arc::new(NoopNotifier),
    )
    .await
    .context("failed to bind relay listeners")?;

    tokio::select! {
        result = server.run() => {
            result.context("accept loop failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}
