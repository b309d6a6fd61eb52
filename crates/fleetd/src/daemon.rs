//! Daemon assembly: wires the store, registry, failover and API together
//! and runs until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use fleet_coordinator::{Coordinator, CoordinatorSettings, RestartCallback, RestartFuture};
use fleet_core::FleetConfig;
use fleet_failover::{FailoverController, FailureClassifier};
use fleet_health::HealthPolicy;
use fleet_registry::WorkerRegistry;
use fleet_state::{StateStore, UpstreamEndpoint};

use crate::executor::ProcessExecutor;

/// Lines buffered between the local process and the failover driver.
const LINE_BUFFER: usize = 1024;

pub async fn run(config: FleetConfig) -> anyhow::Result<()> {
    info!("fleetd starting");

    // Ensure data directory exists.
    let data_dir = &config.server.data_dir;
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("fleetd.redb");

    // ── State + registry ───────────────────────────────────────

    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let registry = Arc::new(
        WorkerRegistry::new(HealthPolicy::from(&config.health))
            .with_store(store),
    );
    let restored = registry.restore()?;
    info!(workers = restored, "registry restored");

    // ── Failover ───────────────────────────────────────────────

    let controller = FailoverController::from_config(&config.failover)?;
    let classifier = FailureClassifier::from_config(&config.failover)?;
    info!(
        upstreams = controller.upstreams().len(),
        active = %controller.active().id,
        threshold = config.failover.failure_threshold,
        "failover controller initialized"
    );

    let mut coordinator = Coordinator::new(
        registry,
        controller,
        classifier,
        CoordinatorSettings::from(&config),
    );

    let (line_tx, mut line_rx) = mpsc::channel::<String>(LINE_BUFFER);
    let executor = config
        .local_process
        .clone()
        .map(|process| Arc::new(ProcessExecutor::new(process, line_tx)));
    if let Some(executor) = &executor {
        coordinator = coordinator.with_restart_callback(restart_callback(executor.clone()));
    } else {
        info!("no [local_process] configured; failover runs without a local process");
    }
    let coordinator = Arc::new(coordinator);

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Background tasks ───────────────────────────────────────

    let sweeper = {
        let coordinator = coordinator.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { coordinator.run_sweeper(shutdown).await })
    };

    let publisher = {
        let coordinator = coordinator.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { coordinator.run_snapshot_publisher(shutdown).await })
    };

    // Local process output → failover driver.
    let forwarder = {
        let coordinator = coordinator.clone();
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    line = line_rx.recv() => {
                        let Some(line) = line else { return };
                        if let Err(e) = coordinator.report_local_line(&line).await {
                            error!(error = %e, "failover halted");
                        }
                    }
                    _ = shutdown.changed() => return,
                }
            }
        })
    };

    if let Some(executor) = &executor {
        let upstream = coordinator.active_upstream();
        if let Err(e) = executor.start(&upstream).await {
            warn!(upstream = %upstream.id, error = %e, "local process failed to start");
        }
    }

    // ── API server ─────────────────────────────────────────────

    let router = fleet_api::build_router(coordinator.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for background tasks.
    let _ = sweeper.await;
    let _ = publisher.await;
    let _ = forwarder.await;
    if let Some(executor) = &executor {
        executor.stop().await;
    }

    info!("fleetd stopped");
    Ok(())
}

fn restart_callback(executor: Arc<ProcessExecutor>) -> RestartCallback {
    Arc::new(move |upstream: UpstreamEndpoint| -> RestartFuture {
        let executor = executor.clone();
        Box::pin(async move {
            if let Err(e) = executor.start(&upstream).await {
                error!(upstream = %upstream.id, error = %e, "local process restart failed");
            }
        })
    })
}
