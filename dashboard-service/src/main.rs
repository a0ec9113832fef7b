use std::{net::SocketAddr, time::Duration};

use anyhow::{Context, Result};
use dashboard_service::{config::AppConfig, metrics_server, observability, routes, state::AppState};

/// How often expired sessions are swept.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let addr: SocketAddr = cfg
        .http
        .bind_addr
        .parse()
        .with_context(|| format!("invalid http.bind_addr {}", cfg.http.bind_addr))?;

    let state = AppState::build(cfg).await?;

    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let pruned = sessions.prune_expired().await;
            if pruned > 0 {
                tracing::debug!(pruned, "expired sessions removed");
            }
        }
    });

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "dashboard service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    tracing::info!("dashboard service stopped");
    Ok(())
}
