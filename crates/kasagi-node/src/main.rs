//! Server process entry point for the Kasagi synchronization engine.
//!
//! Bootstrap order: logging, configuration, coordinator connection,
//! engine context and registry, remote sync subscription, then the sync
//! server. On `SIGINT`/`SIGTERM` the server stops accepting sockets,
//! every live room flushes a final snapshot, the remote sync loop is
//! stopped, and the coordinator connections are closed.
//!
//! Exit codes: 0 on clean shutdown, 1 on bootstrap failure or an error
//! during shutdown.

mod config;
mod error;

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use kasagi_coordinator::{Coordinator, RedisCoordinator};
use kasagi_core::{EngineContext, RemoteSync, RoomRegistry};
use kasagi_server::{AppState, ServerConfig, start_server};

use crate::config::NodeConfig;
use crate::error::NodeError;

#[tokio::main]
async fn main() {
    // RUST_LOG wins when set; LOG_LEVEL is the deployment-facing knob.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
        EnvFilter::new(level)
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("kasagi-node starting");

    if let Err(e) = run().await {
        error!(error = %e, "fatal error");
        std::process::exit(1);
    }

    info!("kasagi-node stopped cleanly");
}

async fn run() -> Result<(), NodeError> {
    let config = NodeConfig::from_env()?;
    info!(
        instance = %config.instance_id,
        ws_port = config.ws_port,
        snapshot_interval = config.engine.snapshot_interval,
        sentinels = config.sentinel.sentinels.len(),
        "configuration loaded"
    );

    let coordinator = Arc::new(Coordinator::Redis(
        RedisCoordinator::connect(&config.sentinel).await?,
    ));

    let ctx = EngineContext::new(
        config.instance_id.clone(),
        config.engine.clone(),
        Arc::clone(&coordinator),
    );
    let registry = RoomRegistry::new(ctx);

    let remote_sync = RemoteSync::spawn(Arc::clone(&registry)).await?;

    let state = Arc::new(AppState::new(Arc::clone(&registry)));
    let server_config = ServerConfig {
        host: String::from("0.0.0.0"),
        port: config.ws_port,
    };

    // Serve until a shutdown signal arrives; the listener then stops
    // accepting and in-flight connections wind down.
    start_server(&server_config, state, shutdown_signal()).await?;

    info!("shutting down: flushing snapshots");
    registry.save_all_snapshots().await;

    remote_sync.abort();
    coordinator.quit().await;

    Ok(())
}

/// Resolve when the process receives `SIGINT` or `SIGTERM`.
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received");
}
