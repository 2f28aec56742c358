//! KEYSTASH API Server Entry Point
//!
//! Loads configuration, builds the store and cache handles, starts the
//! expiry sweeper and cache purge, and serves the Axum router until ctrl-c.

use std::sync::Arc;

use keystash_api::{
    cache_purge_task, create_api_router, expiry_sweep_task, ApiConfig, ApiError, ApiResult,
    AppState, CacheBackendKind, CachePurgeConfig, DbConfig, ExpirySweepConfig, PgStore,
    StoreBackend,
};
use keystash_api::telemetry::{init_tracing, TelemetryConfig};
use keystash_core::{Clock, StoreConfig, SystemClock};
use keystash_storage::{
    CacheBackend, InMemoryCacheBackend, InMemoryObjectStore, InMemoryTenantRegistry,
    LmdbCacheBackend, ObjectStore, TenantRegistry,
};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let api_config = ApiConfig::from_env()
        .map_err(|e| ApiError::invalid_input(format!("Invalid configuration: {}", e)))?;
    let store_config = StoreConfig::default();
    store_config
        .validate()
        .map_err(|e| ApiError::invalid_input(format!("Invalid store configuration: {}", e)))?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (store, registry) = build_store(&api_config).await?;
    let cache = build_cache(&api_config, clock.clone())?;

    let state = AppState::new(
        store.clone(),
        cache.clone(),
        registry,
        clock.clone(),
        store_config,
        api_config.clone(),
    );
    let app = create_api_router(state)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep_config = ExpirySweepConfig::from_env();
    let purge_config = CachePurgeConfig::from_env();
    let purger = tokio::spawn(cache_purge_task(cache, purge_config, shutdown_rx.clone()));
    let sweeper = tokio::spawn(async move {
        expiry_sweep_task(store, clock, sweep_config, shutdown_rx).await
    });

    let addr = api_config
        .socket_addr()
        .map_err(|e| ApiError::invalid_input(e.to_string()))?;
    tracing::info!(%addr, store = ?api_config.store_backend, cache = ?api_config.cache_backend, "Starting KEYSTASH API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "Expiry sweeper task failed");
    }
    if let Err(e) = purger.await {
        tracing::error!(error = %e, "Cache purge task failed");
    }

    Ok(())
}

async fn build_store(
    config: &ApiConfig,
) -> ApiResult<(Arc<dyn ObjectStore>, Arc<dyn TenantRegistry>)> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
            let registry: Arc<dyn TenantRegistry> = Arc::new(InMemoryTenantRegistry::new());
            Ok((store, registry))
        }
        StoreBackend::Postgres => {
            let pg = Arc::new(PgStore::from_config(&DbConfig::from_env())?);
            pg.ensure_schema().await?;
            let store: Arc<dyn ObjectStore> = pg.clone();
            let registry: Arc<dyn TenantRegistry> = pg;
            Ok((store, registry))
        }
    }
}

fn build_cache(config: &ApiConfig, clock: Arc<dyn Clock>) -> ApiResult<Arc<dyn CacheBackend>> {
    match config.cache_backend {
        CacheBackendKind::Memory => Ok(Arc::new(InMemoryCacheBackend::new(clock))),
        CacheBackendKind::Lmdb => {
            let cache = LmdbCacheBackend::new(&config.cache_path, config.cache_map_size_mb, clock)
                .map_err(|e| ApiError::internal_error(format!("Failed to open cache: {}", e)))?;
            Ok(Arc::new(cache))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
