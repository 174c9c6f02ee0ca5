//! # Gatehouse Server
//!
//! Runs the HTTP front door: delegated login completion, bearer token issuance,
//! and the authorization gate in front of the API.

use clap::Parser;
use gatehouse_api::{AppState, build_router};
use std::net::SocketAddr;

#[derive(Debug, Parser)]
#[command(name = "gatehouse", version, about)]
struct Cli {
    /// Config file to load instead of ./gatehouse.{toml,yaml,json}.
    #[arg(short, long, env = "GATEHOUSE_CONFIG")]
    config: Option<String>,

    /// Load and validate the configuration, then exit.
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = gatehouse_common::config::load(cli.config.as_deref())?;

    // Initialize tracing (structured logging)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "gatehouse=debug,gatehouse_api=debug,gatehouse_common=debug,tower_http=debug"
                        .into()
                }),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    if cli.check_config {
        tracing::info!(
            routes = config.routes.len(),
            federation = ?config.federation.mode,
            "Configuration is valid"
        );
        return Ok(());
    }

    tracing::info!("Starting Gatehouse v{}", env!("CARGO_PKG_VERSION"));

    let state = AppState::from_config(&config)?;
    tracing::info!(
        ttl_secs = state.codec.ttl().num_seconds(),
        federation = ?config.federation.mode,
        public_rules = state
            .policy
            .rules()
            .iter()
            .filter(|r| r.access == gatehouse_common::policy::Access::Public)
            .count(),
        "Token codec and route policy ready"
    );
    for rule in state.policy.rules() {
        tracing::debug!(pattern = rule.pattern.as_str(), access = ?rule.access, "Route rule");
    }

    let router = build_router(state);
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
