//! In-memory durable store and tenant registry.
//!
//! Used by tests and by the `memory` store backend. A single `RwLock` guards
//! each map, so insert-if-absent is atomic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ::async_trait::async_trait;
use keystash_core::{
    credential_digest, KeystashError, KeystashResult, Record, StorageError, Tenant, TenantId,
    UnixSeconds,
};

use crate::store::{ObjectStore, TenantRegistry};

type RecordKey = (TenantId, String);

fn read_lock<T>(lock: &RwLock<T>) -> KeystashResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| KeystashError::Storage(StorageError::LockPoisoned))
}

fn write_lock<T>(lock: &RwLock<T>) -> KeystashResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| KeystashError::Storage(StorageError::LockPoisoned))
}

// ============================================================================
// OBJECT STORE
// ============================================================================

/// HashMap-backed object store.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    records: Arc<RwLock<HashMap<RecordKey, Record>>>,
    lookups: AtomicU64,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `find_by_key` calls served so far.
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Number of records held, expired ones included.
    pub fn record_count(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Whether a record is physically present, ignoring expiry.
    pub fn contains(&self, tenant_id: TenantId, key: &str) -> bool {
        self.records
            .read()
            .map(|r| r.contains_key(&(tenant_id, key.to_string())))
            .unwrap_or(false)
    }

    /// Place a record directly, bypassing uniqueness. For seeding fixtures.
    pub fn seed(&self, record: Record) {
        if let Ok(mut records) = self.records.write() {
            records.insert((record.tenant_id, record.key.clone()), record);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.write() {
            records.clear();
        }
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn find_by_key(
        &self,
        tenant_id: TenantId,
        key: &str,
    ) -> KeystashResult<Option<Record>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let records = read_lock(&self.records)?;
        Ok(records.get(&(tenant_id, key.to_string())).cloned())
    }

    async fn insert_if_absent(&self, record: &Record) -> KeystashResult<Record> {
        let mut records = write_lock(&self.records)?;
        let id = (record.tenant_id, record.key.clone());
        if records.contains_key(&id) {
            return Err(KeystashError::conflict(record.tenant_id, &record.key));
        }
        records.insert(id, record.clone());
        Ok(record.clone())
    }

    async fn delete_by_key(&self, tenant_id: TenantId, key: &str) -> KeystashResult<u64> {
        let mut records = write_lock(&self.records)?;
        Ok(records
            .remove(&(tenant_id, key.to_string()))
            .map_or(0, |_| 1))
    }

    async fn delete_if_expired(
        &self,
        tenant_id: TenantId,
        key: &str,
        now: UnixSeconds,
    ) -> KeystashResult<u64> {
        let mut records = write_lock(&self.records)?;
        let id = (tenant_id, key.to_string());
        match records.get(&id) {
            Some(record) if record.is_expired(now) => {
                records.remove(&id);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn find_all(&self, tenant_id: TenantId) -> KeystashResult<Vec<Record>> {
        let records = read_lock(&self.records)?;
        let mut found: Vec<Record> = records
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.key.cmp(&b.key)));
        Ok(found)
    }

    async fn delete_expired(&self, now: UnixSeconds) -> KeystashResult<u64> {
        let mut records = write_lock(&self.records)?;
        let before = records.len();
        records.retain(|_, r| !r.is_expired(now));
        Ok((before - records.len()) as u64)
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

// ============================================================================
// TENANT REGISTRY
// ============================================================================

#[derive(Debug, Default)]
struct TenantTables {
    by_id: HashMap<TenantId, Tenant>,
    by_digest: HashMap<String, TenantId>,
}

/// HashMap-backed tenant registry.
#[derive(Debug, Default)]
pub struct InMemoryTenantRegistry {
    tables: RwLock<TenantTables>,
}

impl InMemoryTenantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tenant_count(&self) -> usize {
        self.tables.read().map(|t| t.by_id.len()).unwrap_or(0)
    }
}

#[async_trait]
impl TenantRegistry for InMemoryTenantRegistry {
    async fn insert_tenant(
        &self,
        tenant: &Tenant,
        credential_digest: &str,
    ) -> KeystashResult<Tenant> {
        let mut tables = write_lock(&self.tables)?;
        if tables.by_id.values().any(|t| t.name == tenant.name) {
            return Err(KeystashError::TenantNameTaken {
                name: tenant.name.clone(),
            });
        }
        if tables.by_id.contains_key(&tenant.tenant_id)
            || tables.by_digest.contains_key(credential_digest)
        {
            return Err(StorageError::ConstraintViolation {
                constraint: "tenants_pkey".to_string(),
                reason: "tenant id or credential already registered".to_string(),
            }
            .into());
        }
        tables
            .by_digest
            .insert(credential_digest.to_string(), tenant.tenant_id);
        tables.by_id.insert(tenant.tenant_id, tenant.clone());
        Ok(tenant.clone())
    }

    async fn get_tenant(&self, tenant_id: TenantId) -> KeystashResult<Option<Tenant>> {
        let tables = read_lock(&self.tables)?;
        Ok(tables.by_id.get(&tenant_id).cloned())
    }

    async fn resolve_tenant(&self, credential: &str) -> KeystashResult<Option<Tenant>> {
        let digest = credential_digest(credential);
        let tables = read_lock(&self.tables)?;
        Ok(tables
            .by_digest
            .get(&digest)
            .and_then(|id| tables.by_id.get(id))
            .cloned())
    }
}
