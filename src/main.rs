//! fieldcache - Local HTTP server for per-field TTL caches
//!
//! Hosts one shared store and exposes namespaces over HTTP so several processes can
//! share a cache during development.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fieldcache::{create_router, AppState, Config, ExpiryModel, MemoryStore, Store};

/// Main entry point for the fieldcache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Connect to Redis, or create the in-memory store
/// 4. Create Axum router with all endpoints
/// 5. Start HTTP server on configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM, stopping vacuum tasks
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber with env filter
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldcache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting fieldcache server");

    // Load configuration from environment variables
    let config = Config::from_env();
    info!(
        "Configuration loaded: expiry_model={}, port={}, vacuum_interval={}s, vacuum_delete_count={}, migration_batch_size={}",
        config.cache.expiry_model,
        config.server_port,
        config.vacuum_interval,
        config.cache.vacuum_delete_count,
        config.cache.migration_batch_size
    );

    let store = open_store(&config).await?;
    let state = AppState::from_config(&config, store);

    // Create router with all endpoints
    let app = create_router(state.clone());

    // Bind to configured port
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Connects to Redis when `REDIS_URL` is set, otherwise uses the in-memory store.
#[cfg(feature = "redis")]
async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    let native = config.cache.expiry_model == ExpiryModel::Native;

    if let Some(url) = &config.redis_url {
        let store = fieldcache::store::RedisStore::connect(url)
            .await
            .with_context(|| format!("failed to connect to {}", url))?
            .with_native_field_ttl(native);
        info!("Connected to Redis store");
        return Ok(Arc::new(store));
    }

    info!("Using in-memory store");
    Ok(Arc::new(MemoryStore::new().with_native_field_ttl(native)))
}

#[cfg(not(feature = "redis"))]
async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    if config.redis_url.is_some() {
        warn!("REDIS_URL is set but the redis feature is disabled, using in-memory store");
    }

    info!("Using in-memory store");
    let native = config.cache.expiry_model == ExpiryModel::Native;
    Ok(Arc::new(MemoryStore::new().with_native_field_ttl(native)))
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, stops the vacuum tasks and allows graceful shutdown.
async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    state.shutdown().await;
    warn!("Vacuum tasks aborted");
}
