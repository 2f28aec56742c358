//! In-process cache backend.
//!
//! Entries carry an absolute expiry read from the injected [`Clock`]; an
//! expired entry is dropped the first time it is looked at.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use keystash_core::{Clock, KeystashResult, SystemClock};
use tokio::sync::RwLock;

use super::tenant_key::TenantScopedKey;
use super::traits::{CacheBackend, CacheStats};

struct CacheEntry {
    value: Vec<u8>,
    expires_at_millis: i64,
}

#[derive(Default)]
struct MemoryCacheState {
    entries: HashMap<Vec<u8>, CacheEntry>,
    stats: CacheStats,
}

/// HashMap-backed cache guarded by a tokio `RwLock`.
pub struct InMemoryCacheBackend {
    state: RwLock<MemoryCacheState>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCacheBackend {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(MemoryCacheState::default()),
            clock,
        }
    }
}

impl Default for InMemoryCacheBackend {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, key: &TenantScopedKey) -> KeystashResult<Option<Vec<u8>>> {
        let encoded = key.encode();
        let now = self.clock.unix_millis();
        let mut state = self.state.write().await;

        let live = match state.entries.get(&encoded) {
            Some(entry) if entry.expires_at_millis > now => Some(entry.value.clone()),
            Some(_) => {
                state.entries.remove(&encoded);
                state.stats.expirations += 1;
                None
            }
            None => None,
        };

        if live.is_some() {
            state.stats.hits += 1;
        } else {
            state.stats.misses += 1;
        }
        Ok(live)
    }

    async fn set_with_expiry(
        &self,
        key: &TenantScopedKey,
        value: &[u8],
        ttl_secs: u64,
    ) -> KeystashResult<()> {
        if ttl_secs == 0 {
            return Ok(());
        }
        let ttl_millis = i64::try_from(ttl_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        let expires_at_millis = self.clock.unix_millis().saturating_add(ttl_millis);

        let mut state = self.state.write().await;
        state.entries.insert(
            key.encode(),
            CacheEntry {
                value: value.to_vec(),
                expires_at_millis,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &TenantScopedKey) -> KeystashResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.entries.remove(&key.encode()).is_some())
    }

    async fn purge_expired(&self) -> KeystashResult<u64> {
        let now = self.clock.unix_millis();
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.expires_at_millis > now);
        let removed = (before - state.entries.len()) as u64;
        state.stats.expirations += removed;
        Ok(removed)
    }

    async fn stats(&self) -> KeystashResult<CacheStats> {
        let state = self.state.read().await;
        let mut stats = state.stats.clone();
        stats.entry_count = state.entries.len() as u64;
        stats.memory_bytes = state.entries.values().map(|e| e.value.len() as u64).sum();
        Ok(stats)
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
