//! Outreach - Campaign send worker entry point

use anyhow::{Context, Result};
use outreach_api::AppState;
use outreach_common::config::{Config, LoggingConfig};
use outreach_core::{build_adapter, PacingPolicy, SendWorker};
use outreach_storage::{DatabasePool, DbCampaignQueue};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting Outreach...");

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;
    info!("Database connection established");

    // Run migrations
    db_pool.migrate().await?;
    info!("Database migrations completed");

    // Delivery backend
    let adapter = build_adapter(&config.delivery)?;
    info!(backend = adapter.name(), "Delivery adapter ready");

    let shutdown = CancellationToken::new();

    // Start send worker
    let worker_handle = {
        let worker = SendWorker::new(
            DbCampaignQueue::new(db_pool.clone()),
            adapter.clone(),
            PacingPolicy::from_config(&config.worker),
            shutdown.clone(),
        );
        tokio::spawn(async move {
            worker.run().await;
        })
    };

    // Start API server if enabled
    let api_handle = if config.api.enabled {
        let state = AppState::new(
            db_pool.clone(),
            adapter.clone(),
            config.contacts.default_country_code.clone(),
        );
        let app = outreach_api::create_router(state);
        let listener = tokio::net::TcpListener::bind(config.api.bind.as_str())
            .await
            .with_context(|| format!("Failed to bind API server on {}", config.api.bind))?;
        info!("Starting API server on {}", config.api.bind);

        let shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await });
            if let Err(e) = serve.await {
                error!("API server error: {}", e);
            }
        }))
    } else {
        info!("API server disabled");
        None
    };

    info!("Outreach started successfully");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    shutdown.cancel();

    if let Err(e) = worker_handle.await {
        error!("Send worker task failed: {}", e);
    }
    if let Some(handle) = api_handle {
        if let Err(e) = handle.await {
            error!("API server task failed: {}", e);
        }
    }

    info!("Outreach shutdown complete");

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(format!("{},outreach=debug", config.level))
            .unwrap_or_else(|_| EnvFilter::new("info,outreach=debug"))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry
            .with(fmt::layer().json().with_target(true).with_level(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
