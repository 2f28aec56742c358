//! Cache layer with multi-tenant isolation.
//!
//! The cache is an accelerator in front of the durable store. Entries carry
//! their own expiry and may vanish at any time; callers must always be able
//! to rebuild them from the store.
//!
//! # Tenant Isolation
//!
//! Every operation takes a [`TenantScopedKey`], which cannot be built
//! without a tenant id.

pub mod lmdb_backend;
pub mod memory;
pub mod tenant_key;
pub mod traits;

pub use lmdb_backend::{LmdbCacheBackend, LmdbCacheError};
pub use memory::InMemoryCacheBackend;
pub use tenant_key::TenantScopedKey;
pub use traits::{CacheBackend, CacheStats};
