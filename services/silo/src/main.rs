//! Chronicle silo
//!
//! Hosts journaled actors and exposes them over HTTP. Actors activate on
//! first command, passivate when idle, and persist their snapshots on
//! shutdown.

use std::sync::Arc;

use anyhow::Result;
use chronicle_engine::HostConfig;
use chronicle_journal::{
    JournalProvider, MemoryJournalProvider, MemorySnapshotStore, SnapshotStore,
};
use chronicle_silo::{
    api,
    config::{self, StorageBackend},
    db::Database,
    passivation::PassivationWorker,
    state::AppState,
};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to SILO_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting chronicle silo");
    info!(
        listen_addr = %config.listen_addr,
        storage = ?config.storage,
        idle_timeout_secs = config.idle_timeout.as_secs(),
        "Configuration loaded"
    );

    let (journals, snapshots, db): (Arc<dyn JournalProvider>, Arc<dyn SnapshotStore>, _) =
        match config.storage {
            StorageBackend::Memory => {
                warn!("Using in-memory storage; journals are lost on exit");
                (
                    Arc::new(MemoryJournalProvider::new()),
                    Arc::new(MemorySnapshotStore::new()),
                    None,
                )
            }
            StorageBackend::Postgres => {
                let db = match Database::connect(&config.database).await {
                    Ok(db) => {
                        info!("Database connection established");
                        db
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to connect to database");
                        return Err(e.into());
                    }
                };

                // Run migrations in dev mode
                if config.dev_mode {
                    info!("Running database migrations (dev mode)");
                    if let Err(e) = db.run_migrations().await {
                        error!(error = %e, "Failed to run migrations");
                        return Err(e.into());
                    }
                }

                (
                    Arc::new(db.journals()),
                    Arc::new(db.snapshots()),
                    Some(db),
                )
            }
        };

    let host = HostConfig {
        idle_timeout: config.idle_timeout,
    };
    let state = AppState::with_storage(journals, snapshots, host, db);
    let ingress = state.ingress().clone();

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start passivation worker in background
    let passivation_worker = PassivationWorker::new(ingress.clone(), config.passivation_interval);
    let passivation_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            passivation_worker.run(shutdown_rx).await;
        }
    });

    // Build and run the server
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    // Spawn the server with graceful shutdown
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
    });

    // Wait for shutdown signal (Ctrl+C)
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    // Signal shutdown to all workers
    let _ = shutdown_tx.send(true);

    let shutdown_timeout = std::time::Duration::from_secs(10);
    if let Err(e) = tokio::time::timeout(shutdown_timeout, passivation_handle).await {
        warn!(error = %e, "Passivation worker did not shut down in time");
    }

    // Deactivate every actor so snapshots are persisted
    info!("Deactivating actors...");
    if tokio::time::timeout(shutdown_timeout, ingress.shutdown())
        .await
        .is_err()
    {
        warn!("Actors did not deactivate in time");
    }

    info!("Silo shutdown complete");
    Ok(())
}
