//! KEYSTASH Storage - Store Traits, Cache Layer and In-Memory Backends
//!
//! Defines the durable store, tenant registry and cache abstractions. The
//! PostgreSQL implementation lives in keystash-api.

pub mod cache;
pub mod memory;
pub mod store;

pub use cache::{
    CacheBackend, CacheStats, InMemoryCacheBackend, LmdbCacheBackend, LmdbCacheError,
    TenantScopedKey,
};
pub use memory::{InMemoryObjectStore, InMemoryTenantRegistry};
pub use store::{ObjectStore, TenantRegistry};
