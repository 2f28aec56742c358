//! Shared application state for Axum routers.

use std::sync::Arc;

use keystash_core::{Clock, StoreConfig, SystemClock};
use keystash_storage::{
    CacheBackend, InMemoryCacheBackend, InMemoryObjectStore, InMemoryTenantRegistry, ObjectStore,
    TenantRegistry,
};

use crate::config::ApiConfig;
use crate::services::{ObjectService, TenantService};

/// Application-wide state shared across all routes.
///
/// Store, cache and registry handles are built once at startup and passed
/// in; nothing here is a global.
#[derive(Clone)]
pub struct AppState {
    pub objects: Arc<ObjectService>,
    pub tenants: Arc<TenantService>,
    /// Durable store, for health checks and the sweeper.
    pub store: Arc<dyn ObjectStore>,
    pub registry: Arc<dyn TenantRegistry>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<ApiConfig>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        cache: Arc<dyn CacheBackend>,
        registry: Arc<dyn TenantRegistry>,
        clock: Arc<dyn Clock>,
        store_config: StoreConfig,
        config: ApiConfig,
    ) -> Self {
        let objects = Arc::new(ObjectService::new(
            store.clone(),
            cache,
            registry.clone(),
            clock.clone(),
            store_config.clone(),
        ));
        let tenants = Arc::new(TenantService::new(
            registry.clone(),
            clock.clone(),
            store_config,
        ));
        Self {
            objects,
            tenants,
            store,
            registry,
            clock,
            config: Arc::new(config),
            start_time: std::time::Instant::now(),
        }
    }

    /// State over in-memory store, registry and cache.
    pub fn in_memory(clock: Arc<dyn Clock>, config: ApiConfig) -> Self {
        let store: Arc<InMemoryObjectStore> = Arc::new(InMemoryObjectStore::new());
        let registry: Arc<InMemoryTenantRegistry> = Arc::new(InMemoryTenantRegistry::new());
        let cache = Arc::new(InMemoryCacheBackend::new(clock.clone()));
        Self::new(store, cache, registry, clock, StoreConfig::default(), config)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::in_memory(Arc::new(SystemClock), ApiConfig::default())
    }
}

crate::impl_from_ref!(Arc<ObjectService>, objects);
crate::impl_from_ref!(Arc<TenantService>, tenants);
crate::impl_from_ref!(Arc<dyn ObjectStore>, store);
crate::impl_from_ref!(Arc<ApiConfig>, config);
crate::impl_from_ref!(std::time::Instant, start_time);
