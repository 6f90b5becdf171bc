use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::{error, info, warn};

use super::{
    services::{download, health, ping, send_file},
    state::AppState,
};
use crate::cleanup::Sweeper;
use crate::config::Config;
use crate::ledger;
use crate::observability::Metrics;
use crate::queue::JobDispatcher;
use crate::report::Reporter;
use crate::worker::{AdmissionGate, Fs2DiskUsage, JobRunner};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/download", post(download))
        .route("/downloads/{filename}", get(send_file))
        .route("/ping", get(ping))
        .route("/health", get(health))
        .with_state(state)
        // Automatically decompress gzip request bodies
        .layer(RequestDecompressionLayer::new())
}

/// Generated when no token is configured; logged once so operators can sign requests
fn ensure_token(config: &mut Config) {
    if config.server.token.as_deref().is_some_and(|t| !t.is_empty()) {
        return;
    }
    let token = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
    warn!(%token, "BOARDBOX_TOKEN not set, generated a random signing token");
    config.server.token = Some(token);
}

pub async fn run(mut config: Config, address: Option<SocketAddr>) -> Result<(), AnyError> {
    ensure_token(&mut config);
    let address = address.unwrap_or(config.server.bind_addr);

    tokio::fs::create_dir_all(&config.storage.download_dir).await?;

    info!(backend = ?config.storage.record_backend, "Opening job record store");
    let store = ledger::open_store(&config.storage)
        .map_err(|e| format!("Failed to open job record store: {}", e))?;

    let metrics = Arc::new(Metrics::new());
    let disk = Arc::new(Fs2DiskUsage);
    let reporter = Reporter::new(&config.report)?;

    let runner = JobRunner::new(
        &config,
        AdmissionGate::new(disk.clone()),
        reporter.clone(),
        metrics.clone(),
    )?;
    let (dispatcher, dispatch_loop) = JobDispatcher::new(Arc::new(runner), &config.dispatch);
    let dispatch_handle = tokio::spawn(dispatch_loop.run());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_handle = if config.cleanup.enabled {
        let sweeper = Sweeper::new(&config, store.clone(), reporter, metrics.clone());
        Some(tokio::spawn(sweeper.run(config.cleanup.interval(), shutdown_rx)))
    } else {
        info!("Cleanup sweeper disabled");
        None
    };

    let config = Arc::new(config);
    let state = AppState::new(config, store, dispatcher, disk, metrics);
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "boardbox listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweeper_handle {
        if let Err(e) = handle.await {
            error!(error = %e, "Cleanup sweeper task failed");
        }
    }
    // the router owned the last dispatcher handle, so the loop drains and exits
    if let Err(e) = dispatch_handle.await {
        error!(error = %e, "Dispatch loop task failed");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_token_keeps_configured_value() {
        let mut config = Config::default();
        config.server.token = Some("secret".to_string());
        ensure_token(&mut config);
        assert_eq!(config.server.token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_ensure_token_generates_when_missing() {
        let mut config = Config::default();
        ensure_token(&mut config);
        let token = config.server.token.unwrap();
        assert_eq!(token.len(), 8);
        assert!(token.bytes().all(|b| b.is_ascii_hexdigit()));
    }
}
