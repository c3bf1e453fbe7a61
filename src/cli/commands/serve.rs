use anyhow::Context;
use clap::Args;
use std::sync::Arc;
use tracing::info;

use crate::cli::Target;
use crate::handlers;
use crate::state::AppState;

const DEFAULT_PORT: u16 = 8080;

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    #[arg(long, help = "Port to listen on (defaults to API_PORT, then PORT, then 8080)")]
    pub port: Option<u16>,

    #[arg(long, default_value = "0.0.0.0", help = "Address to bind")]
    pub host: Option<String>,
}

fn port_from_env() -> Option<u16> {
    std::env::var("API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
}

pub async fn handle(args: ServeArgs, target: &Target) -> anyhow::Result<()> {
    let container = target
        .build()
        .with_context(|| format!("failed to build configuration for '{}'", target.environment))?;
    let state = AppState::new(Arc::new(container));

    // Surface a missing secret now instead of as 401s later
    state.jwt().context("JWT component is misconfigured")?;

    let app = handlers::router(state).context("failed to build router")?;

    let port = args.port.or_else(port_from_env).unwrap_or(DEFAULT_PORT);
    let host = args.host.unwrap_or_else(|| "0.0.0.0".to_string());
    let bind_addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!(environment = target.environment.as_str(), "Listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Unable to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
