//! Shared wiring for integration tests: services and routers over
//! in-memory backends with a manual clock.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use keystash_api::{create_api_router, ApiConfig, AppState, ObjectService};
use keystash_core::{credential_digest, Clock, ManualClock, StoreConfig, Tenant};
use keystash_storage::{
    CacheBackend, InMemoryCacheBackend, InMemoryObjectStore, InMemoryTenantRegistry, ObjectStore,
    TenantRegistry,
};
use keystash_test_utils::{fixtures, TEST_NOW};

pub const API_KEY: &str = "test-api-key";

/// An object service with handles to everything behind it.
pub struct ServiceHarness {
    pub service: ObjectService,
    pub store: Arc<InMemoryObjectStore>,
    pub cache: Arc<InMemoryCacheBackend>,
    pub registry: Arc<InMemoryTenantRegistry>,
    pub clock: Arc<ManualClock>,
    pub tenant: Tenant,
}

impl ServiceHarness {
    pub async fn new(limit_bytes: u64) -> Self {
        let clock = Arc::new(ManualClock::at_unix(TEST_NOW));
        let tenant = fixtures::tenant(limit_bytes);
        let registry = fixtures::registry_with(&tenant, API_KEY)
            .await
            .expect("registry");
        let store = Arc::new(InMemoryObjectStore::new());
        let cache = Arc::new(InMemoryCacheBackend::new(clock.clone()));
        let service = ObjectService::new(
            store.clone(),
            cache.clone(),
            registry.clone(),
            clock.clone(),
            StoreConfig::default(),
        );
        Self {
            service,
            store,
            cache,
            registry,
            clock,
            tenant,
        }
    }

    /// Register another tenant with the same registry.
    pub async fn add_tenant(&self, limit_bytes: u64, api_key: &str) -> Tenant {
        let tenant = fixtures::tenant(limit_bytes);
        self.registry
            .insert_tenant(&tenant, &credential_digest(api_key))
            .await
            .expect("tenant");
        tenant
    }
}

/// Object service over an arbitrary store.
pub async fn service_over(
    store: Arc<dyn ObjectStore>,
    limit_bytes: u64,
) -> (ObjectService, Tenant, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at_unix(TEST_NOW));
    let cache: Arc<dyn CacheBackend> = Arc::new(InMemoryCacheBackend::new(clock.clone()));
    let (service, tenant) = service_with(store, cache, clock.clone(), limit_bytes).await;
    (service, tenant, clock)
}

/// Object service over an arbitrary store and cache, both on `clock`.
pub async fn service_with(
    store: Arc<dyn ObjectStore>,
    cache: Arc<dyn CacheBackend>,
    clock: Arc<ManualClock>,
    limit_bytes: u64,
) -> (ObjectService, Tenant) {
    let tenant = fixtures::tenant(limit_bytes);
    let registry: Arc<dyn TenantRegistry> = fixtures::registry_with(&tenant, API_KEY)
        .await
        .expect("registry");
    let service = ObjectService::new(store, cache, registry, clock, StoreConfig::default());
    (service, tenant)
}

/// Full router over in-memory backends and a manual clock.
pub fn test_app(config: ApiConfig) -> (Router, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at_unix(TEST_NOW));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let state = AppState::in_memory(dyn_clock, config);
    let app = create_api_router(state).expect("router");
    (app, clock)
}

pub fn json_request(
    method: &str,
    uri: &str,
    api_key: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn empty_request(method: &str, uri: &str, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::empty()).expect("request")
}

pub async fn body_json(response: Response<Body>) -> Result<serde_json::Value, String> {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .map_err(|e| format!("Failed to read body: {}", e))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("Body is not JSON: {}", e))
}
