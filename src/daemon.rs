use std::sync::Arc;
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use crate::config::{self, Args, Config};
use crate::http::{server, StatusService};
use crate::refresh::{CommandCollector, RefreshCoordinator};
use crate::snapshot::SnapshotStore;
use crate::utils;

/// Process entry point; returns the exit code
pub async fn run() -> u8 {
    let args = Args::parse();

    if let Err(e) = utils::init_tracing() {
        eprintln!("Failed to initialize logging: {}", e);
        return 1;
    }

    let cfg = match config::load(&args) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return 1;
        }
    };

    match serve(cfg).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("Server error: {}", e);
            1
        }
    }
}

async fn serve(cfg: Config) -> crate::Result<()> {
    let addr = cfg.listen_addr()?;
    tracing::info!(
        "Starting statusd: listen={}, refresh every {} min, collector=\"{}\", artifact={}",
        addr,
        cfg.refresh_interval_minutes,
        cfg.collector_command,
        cfg.artifact_path.display()
    );
    match cfg.collector_timeout() {
        Some(limit) => tracing::info!("Collector timeout: {:?}", limit),
        None => tracing::info!("Collector timeout: none"),
    }

    // bind first, an unusable port aborts before any refresh is started
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("failed to bind {}: {}", addr, e))?;

    let collector = CommandCollector::new(cfg.collector_argv())
        .with_working_dir(cfg.working_dir.clone())
        .with_timeout(cfg.collector_timeout());

    let store = Arc::new(SnapshotStore::new());
    let coordinator = Arc::new(RefreshCoordinator::new(
        store.clone(),
        Arc::new(collector),
        cfg.artifact_path.clone(),
    ));

    let shutdown = CancellationToken::new();
    let scheduler = coordinator.schedule_periodic(cfg.refresh_interval(), shutdown.clone());

    let service = StatusService::new(store, coordinator, cfg.refresh_interval_minutes);
    tracing::info!("HTTP status server listening on http://{}/", addr);

    let stop = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        stop.cancel();
    });

    server::start(listener, service, async move { shutdown.cancelled().await }).await?;

    // an in-flight refresh is abandoned; its child is killed once the
    // runtime shuts down and drops the task
    scheduler.abort();
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Shutdown requested");
}
