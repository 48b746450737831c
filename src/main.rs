use std::time::Duration;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hostel_power_service::{
    api::{self, AppState},
    config::Config,
    monitor::MonitorService,
    snapshot_cache::SnapshotCache,
    tuya::TuyaClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Env vars may be set externally, so a missing .env is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    info!(base_url = %config.tuya.base_url, "Configuration loaded");

    let tuya = TuyaClient::new(&config.tuya).context("failed to build Tuya client")?;
    let cache = SnapshotCache::new();

    // Poller and HTTP handlers share one client, hence one token cache.
    {
        let monitor = MonitorService::new(tuya.clone(), cache.clone(), config.thresholds);
        let interval = Duration::from_secs(config.poll_interval_secs);
        tokio::spawn(monitor.run(interval));
    }

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(AppState { cache, tuya }))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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
