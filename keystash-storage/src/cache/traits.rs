//! Cache backend trait.
//!
//! Backends store opaque bytes under tenant-scoped keys with a per-entry
//! expiry. The durable store stays authoritative; everything here may be
//! lost at any time.

use async_trait::async_trait;
use keystash_core::KeystashResult;

use super::tenant_key::TenantScopedKey;

/// Cache backend trait for pluggable cache implementations.
///
/// Implementations must be thread-safe and must never return an entry after
/// its expiry has passed.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get a live value, or `None` on a miss or an expired entry.
    async fn get(&self, key: &TenantScopedKey) -> KeystashResult<Option<Vec<u8>>>;

    /// Store a value that disappears after `ttl_secs` seconds.
    ///
    /// A `ttl_secs` of zero stores nothing.
    async fn set_with_expiry(
        &self,
        key: &TenantScopedKey,
        value: &[u8],
        ttl_secs: u64,
    ) -> KeystashResult<()>;

    /// Remove an entry. Returns whether one was present.
    async fn delete(&self, key: &TenantScopedKey) -> KeystashResult<bool>;

    /// Remove every entry whose expiry has passed. Returns how many went.
    ///
    /// Reads already skip expired entries; this reclaims the space held by
    /// entries nobody reads again.
    async fn purge_expired(&self) -> KeystashResult<u64>;

    /// Get cache statistics.
    async fn stats(&self) -> KeystashResult<CacheStats>;

    /// Short backend name for logs and health output.
    fn backend_type(&self) -> &'static str;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, expired entries included.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Approximate payload bytes held.
    pub memory_bytes: u64,
    /// Entries removed because their expiry passed.
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
