//! tutorhub API server
//!
//! Serves the job and tutor REST API on top of the identity core: numeric
//! ids come from the sequence allocator and every `{id}` path segment goes
//! through the entity locator.

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tutorhub_api::{
    api,
    config::{self, StoreBackend},
    state::AppState,
};
use tutorhub_store::Database;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::from_env()?;

    // Prefer RUST_LOG, fall back to TUTORHUB_LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting tutorhub API");
    info!(
        listen_addr = %config.listen_addr,
        store = ?config.store,
        sequence_fallback = ?config.sequence_fallback,
        "Configuration loaded"
    );

    let state = match config.store {
        StoreBackend::Memory => {
            warn!("Using in-memory store, data will not survive a restart");
            AppState::in_memory(config.sequence_fallback)
        }
        StoreBackend::Postgres => {
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

            if config.dev_mode {
                info!("Running database migrations (dev mode)");
                if let Err(e) = db.run_migrations().await {
                    error!(error = %e, "Failed to run migrations");
                    return Err(e.into());
                }
            }

            AppState::postgres(db, config.sequence_fallback)
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

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

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    info!("tutorhub API shutdown complete");
    Ok(())
}
