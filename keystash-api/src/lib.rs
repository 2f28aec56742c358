//! KEYSTASH API - Multi-Tenant Object Store Service
//!
//! Object and tenant services over a durable store and a cache-aside layer,
//! the expiry sweeper, the PostgreSQL store, and the REST surface (Axum)
//! with API key auth and per-tenant rate limiting.

#[macro_use]
mod macros;

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod extractors;
pub mod jobs;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use config::{ApiConfig, CacheBackendKind, StoreBackend};
pub use db::{DbConfig, PgStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{
    cache_purge_task, expiry_sweep_task, sweep_once, CachePurgeConfig, ExpirySweepConfig,
    ExpirySweepMetrics,
};
pub use middleware::{auth_middleware, rate_limit_middleware, AuthMiddlewareState, AuthTenant};
pub use routes::{create_api_router, SecureRouterBuilder};
pub use services::{ObjectService, TenantService};
pub use state::AppState;
pub use types::*;
