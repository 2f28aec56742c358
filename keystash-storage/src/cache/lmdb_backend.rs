//! LMDB-backed cache implementation with tenant isolation.
//!
//! Uses the heed crate (Rust bindings for LMDB) for a memory-mapped cache
//! that survives process restarts.
//!
//! # Value Layout
//!
//! `[expires_at: unix millis, 8 bytes LE][payload]`
//!
//! An entry whose expiry has passed is reported as a miss and removed in the
//! same call. [`CacheBackend::purge_expired`] compacts the rest.

use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use keystash_core::{CacheError, Clock, KeystashError, KeystashResult};

use super::tenant_key::TenantScopedKey;
use super::traits::{CacheBackend, CacheStats};

const EXPIRY_HEADER_LEN: usize = 8;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Stored value is shorter than its header.
    #[error("Corrupt entry: {0}")]
    Corrupt(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for KeystashError {
    fn from(e: LmdbCacheError) -> Self {
        match e {
            LmdbCacheError::Corrupt(reason) => CacheError::Serialization { reason }.into(),
            other => CacheError::Backend {
                backend: "lmdb".to_string(),
                reason: other.to_string(),
            }
            .into(),
        }
    }
}

fn txn_err(e: heed::Error) -> LmdbCacheError {
    LmdbCacheError::Transaction(e.to_string())
}

/// Split a stored value into its expiry and payload.
fn decode_entry(bytes: &[u8]) -> Result<(i64, &[u8]), LmdbCacheError> {
    if bytes.len() < EXPIRY_HEADER_LEN {
        return Err(LmdbCacheError::Corrupt(format!(
            "entry is {} bytes, header needs {}",
            bytes.len(),
            EXPIRY_HEADER_LEN
        )));
    }
    let (header, payload) = bytes.split_at(EXPIRY_HEADER_LEN);
    let mut expiry = [0u8; EXPIRY_HEADER_LEN];
    expiry.copy_from_slice(header);
    Ok((i64::from_le_bytes(expiry), payload))
}

fn encode_entry(expires_at_millis: i64, payload: &[u8]) -> Vec<u8> {
    let mut full = Vec::with_capacity(EXPIRY_HEADER_LEN + payload.len());
    full.extend_from_slice(&expires_at_millis.to_le_bytes());
    full.extend_from_slice(payload);
    full
}

/// LMDB-backed cache with tenant isolation.
pub struct LmdbCacheBackend {
    env: Env,
    db: Database<Bytes, Bytes>,
    clock: Arc<dyn Clock>,
    stats: Arc<RwLock<CacheStats>>,
}

impl LmdbCacheBackend {
    /// Open (or create) a cache under `path` with a map of `max_size_mb`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the LMDB
    /// environment or database cannot be opened.
    pub fn new<P: AsRef<Path>>(
        path: P,
        max_size_mb: usize,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_err)?;

        Ok(Self {
            env,
            db,
            clock,
            stats: Arc::new(RwLock::new(CacheStats::default())),
        })
    }

    fn update_stats(&self, f: impl FnOnce(&mut CacheStats)) {
        if let Ok(mut stats) = self.stats.write() {
            f(&mut stats);
        }
    }

    fn delete_keys(&self, keys: &[Vec<u8>]) -> Result<u64, LmdbCacheError> {
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let mut deleted = 0u64;
        for key in keys {
            if self.db.delete(&mut wtxn, key.as_slice()).map_err(txn_err)? {
                deleted += 1;
            }
        }
        wtxn.commit().map_err(txn_err)?;
        Ok(deleted)
    }

    /// Remove every entry whose expiry has passed.
    pub fn purge_expired_entries(&self) -> Result<u64, LmdbCacheError> {
        let now = self.clock.unix_millis();
        let expired = {
            let rtxn = self.env.read_txn().map_err(txn_err)?;
            let mut expired = Vec::new();
            for result in self.db.iter(&rtxn).map_err(txn_err)? {
                let (key, value) = result.map_err(txn_err)?;
                let stale = match decode_entry(value) {
                    Ok((expires_at, _)) => expires_at <= now,
                    Err(_) => true,
                };
                if stale {
                    expired.push(key.to_vec());
                }
            }
            expired
        };
        let deleted = self.delete_keys(&expired)?;
        self.update_stats(|s| s.expirations += deleted);
        Ok(deleted)
    }

    fn entry_totals(&self) -> Result<(u64, u64), LmdbCacheError> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let mut count = 0u64;
        let mut bytes = 0u64;
        for result in self.db.iter(&rtxn).map_err(txn_err)? {
            let (_, value) = result.map_err(txn_err)?;
            count += 1;
            bytes += value.len().saturating_sub(EXPIRY_HEADER_LEN) as u64;
        }
        Ok((count, bytes))
    }
}

#[async_trait]
impl CacheBackend for LmdbCacheBackend {
    async fn get(&self, key: &TenantScopedKey) -> KeystashResult<Option<Vec<u8>>> {
        let encoded = key.encode();
        let now = self.clock.unix_millis();

        let found = {
            let rtxn = self.env.read_txn().map_err(txn_err)?;
            match self.db.get(&rtxn, encoded.as_slice()).map_err(txn_err)? {
                Some(bytes) => {
                    let (expires_at, payload) = decode_entry(bytes)?;
                    Some((expires_at, payload.to_vec()))
                }
                None => None,
            }
        };

        match found {
            Some((expires_at, payload)) if expires_at > now => {
                self.update_stats(|s| s.hits += 1);
                Ok(Some(payload))
            }
            Some(_) => {
                self.delete_keys(&[encoded])?;
                self.update_stats(|s| {
                    s.misses += 1;
                    s.expirations += 1;
                });
                Ok(None)
            }
            None => {
                self.update_stats(|s| s.misses += 1);
                Ok(None)
            }
        }
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
        let expires_at = self.clock.unix_millis().saturating_add(ttl_millis);
        let full = encode_entry(expires_at, value);

        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        self.db
            .put(&mut wtxn, key.encode().as_slice(), full.as_slice())
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(())
    }

    async fn delete(&self, key: &TenantScopedKey) -> KeystashResult<bool> {
        Ok(self.delete_keys(&[key.encode()])? > 0)
    }

    async fn purge_expired(&self) -> KeystashResult<u64> {
        Ok(self.purge_expired_entries()?)
    }

    async fn stats(&self) -> KeystashResult<CacheStats> {
        let (entry_count, memory_bytes) = self.entry_totals()?;
        let mut stats = self
            .stats
            .read()
            .map(|s| s.clone())
            .unwrap_or_default();
        stats.entry_count = entry_count;
        stats.memory_bytes = memory_bytes;
        Ok(stats)
    }

    fn backend_type(&self) -> &'static str {
        "lmdb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystash_core::ManualClock;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn create_test_backend() -> (LmdbCacheBackend, Arc<ManualClock>, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let backend = LmdbCacheBackend::new(temp_dir.path(), 10, clock.clone())
            .expect("backend creation should succeed");
        (backend, clock, temp_dir)
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (backend, _clock, _dir) = create_test_backend();
        let key = TenantScopedKey::new(Uuid::now_v7(), "k1");

        backend
            .set_with_expiry(&key, br#"{"a":1}"#, 60)
            .await
            .expect("set should succeed");
        let cached = backend.get(&key).await.expect("get should succeed");
        assert_eq!(cached, Some(br#"{"a":1}"#.to_vec()));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let (backend, _clock, _dir) = create_test_backend();
        let key = TenantScopedKey::new(Uuid::now_v7(), "missing");
        assert!(backend.get(&key).await.expect("get should succeed").is_none());
        assert_eq!(backend.stats().await.expect("stats").misses, 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_not_stored() {
        let (backend, _clock, _dir) = create_test_backend();
        let key = TenantScopedKey::new(Uuid::now_v7(), "k1");
        backend.set_with_expiry(&key, b"x", 0).await.expect("set");
        assert_eq!(backend.stats().await.expect("stats").entry_count, 0);
    }

    #[tokio::test]
    async fn test_expired_entry_is_removed_on_read() {
        let (backend, clock, _dir) = create_test_backend();
        let key = TenantScopedKey::new(Uuid::now_v7(), "k1");
        backend.set_with_expiry(&key, b"x", 30).await.expect("set");

        clock.advance_secs(31);
        assert!(backend.get(&key).await.expect("get").is_none());

        let stats = backend.stats().await.expect("stats");
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.expirations, 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let (backend, _clock, _dir) = create_test_backend();
        let key = TenantScopedKey::new(Uuid::now_v7(), "k1");
        backend.set_with_expiry(&key, b"x", 60).await.expect("set");

        assert!(backend.delete(&key).await.expect("delete"));
        assert!(!backend.delete(&key).await.expect("delete again"));
        assert!(backend.get(&key).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let (backend, _clock, _dir) = create_test_backend();
        let tenant1 = Uuid::now_v7();
        let tenant2 = Uuid::now_v7();
        backend
            .set_with_expiry(&TenantScopedKey::new(tenant1, "shared"), b"one", 60)
            .await
            .expect("set");

        let other = backend
            .get(&TenantScopedKey::new(tenant2, "shared"))
            .await
            .expect("get");
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (backend, clock, _dir) = create_test_backend();
        let tenant = Uuid::now_v7();
        backend
            .set_with_expiry(&TenantScopedKey::new(tenant, "short"), b"x", 5)
            .await
            .expect("set");
        backend
            .set_with_expiry(&TenantScopedKey::new(tenant, "long"), b"x", 3600)
            .await
            .expect("set");

        clock.advance_secs(60);
        assert_eq!(backend.purge_expired().await.expect("purge"), 1);
        assert_eq!(backend.stats().await.expect("stats").entry_count, 1);
    }

    #[test]
    fn test_decode_entry_rejects_short_value() {
        assert!(matches!(
            decode_entry(&[1, 2, 3]),
            Err(LmdbCacheError::Corrupt(_))
        ));
        let encoded = encode_entry(42, b"payload");
        let (expires_at, payload) = decode_entry(&encoded).expect("decode");
        assert_eq!(expires_at, 42);
        assert_eq!(payload, b"payload");
    }
}
