//! Object Service
//!
//! Create, read, delete and batch create over the durable store with a
//! cache-aside layer in front of it.
//!
//! The store is authoritative. Cache writes are best-effort and a cache read
//! failure falls back to the store. Uniqueness is enforced by the store's
//! insert-if-absent; quota checks for one tenant are serialized through a
//! per-tenant async mutex so two creates cannot both pass the same check.

use std::sync::Arc;

use dashmap::DashMap;
use keystash_core::{
    validate_key, validate_ttl, Clock, ErrorKind, KeystashError, KeystashResult, Record,
    StorageError, StoreConfig, Tenant, TenantId, UnixSeconds, ValidationError,
};
use keystash_storage::{CacheBackend, ObjectStore, TenantRegistry, TenantScopedKey};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::telemetry::metrics;
use crate::types::{BatchCreateResponse, CreateObjectRequest};

fn outcome_label<T>(result: &KeystashResult<T>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => match e.kind() {
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::Internal => "error",
        },
    }
}

fn record_outcome<T>(operation: &str, result: &KeystashResult<T>) {
    if let Some(m) = metrics() {
        m.record_operation(operation, outcome_label(result));
    }
}

/// Orchestrates the durable store, cache and tenant registry.
pub struct ObjectService {
    store: Arc<dyn ObjectStore>,
    cache: Arc<dyn CacheBackend>,
    tenants: Arc<dyn TenantRegistry>,
    clock: Arc<dyn Clock>,
    config: StoreConfig,
    quota_locks: DashMap<TenantId, Arc<Mutex<()>>>,
}

impl ObjectService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        cache: Arc<dyn CacheBackend>,
        tenants: Arc<dyn TenantRegistry>,
        clock: Arc<dyn Clock>,
        config: StoreConfig,
    ) -> Self {
        Self {
            store,
            cache,
            tenants,
            clock,
            config,
            quota_locks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<dyn CacheBackend> {
        &self.cache
    }

    // ========================================================================
    // CREATE
    // ========================================================================

    /// Create one object.
    ///
    /// # Errors
    /// - `Conflict` if a live record already holds the key
    /// - `QuotaExceeded` if the payload does not fit the tenant's quota
    /// - `Validation` for an empty or oversized key or a ttl not in the future
    pub async fn create(
        &self,
        tenant_id: TenantId,
        request: CreateObjectRequest,
    ) -> KeystashResult<Record> {
        let result = self.create_inner(tenant_id, request).await;
        record_outcome("create", &result);
        result
    }

    async fn create_inner(
        &self,
        tenant_id: TenantId,
        request: CreateObjectRequest,
    ) -> KeystashResult<Record> {
        let now = self.clock.unix_now();
        self.validate(&request, now)?;
        let tenant = self.tenant(tenant_id).await?;

        if self.find_live(tenant_id, &request.key, now).await?.is_some() {
            return Err(KeystashError::conflict(tenant_id, request.key));
        }

        let record = self.insert_within_quota(&tenant, request, now).await?;
        self.fill_cache(&record, now).await;
        tracing::debug!(tenant_id = %tenant_id, key = %record.key, size = record.size_bytes, "Object created");
        Ok(record)
    }

    // ========================================================================
    // READ
    // ========================================================================

    /// Read an object's data, cache first.
    ///
    /// An expired record is deleted from the store before `NotFound` is
    /// returned, whether or not the sweeper has run.
    pub async fn get(&self, tenant_id: TenantId, key: &str) -> KeystashResult<Value> {
        let result = self.get_inner(tenant_id, key).await;
        record_outcome("get", &result);
        result
    }

    async fn get_inner(&self, tenant_id: TenantId, key: &str) -> KeystashResult<Value> {
        let scoped = TenantScopedKey::new(tenant_id, key);

        if let Some(value) = self.read_cache(&scoped).await {
            return Ok(value);
        }

        let record = self
            .store
            .find_by_key(tenant_id, key)
            .await?
            .ok_or_else(|| KeystashError::not_found(tenant_id, key))?;

        let now = self.clock.unix_now();
        if record.is_expired(now) {
            self.store.delete_if_expired(tenant_id, key, now).await?;
            self.evict_best_effort(&scoped).await;
            if let Some(m) = metrics() {
                m.record_lazy_expiration();
            }
            tracing::debug!(tenant_id = %tenant_id, key = %key, "Expired object reclaimed on read");
            return Err(KeystashError::Expired {
                tenant_id,
                key: key.to_string(),
            });
        }

        self.fill_cache(&record, now).await;
        Ok(record.data)
    }

    // ========================================================================
    // DELETE
    // ========================================================================

    /// Delete an object and evict its cache entry.
    ///
    /// Once the store delete commits the call succeeds. A failed eviction is
    /// logged; the entry it leaves behind expires no later than the record's
    /// ttl would have.
    pub async fn delete(&self, tenant_id: TenantId, key: &str) -> KeystashResult<()> {
        let result = self.delete_inner(tenant_id, key).await;
        record_outcome("delete", &result);
        result
    }

    async fn delete_inner(&self, tenant_id: TenantId, key: &str) -> KeystashResult<()> {
        let scoped = TenantScopedKey::new(tenant_id, key);
        let rows = self.store.delete_by_key(tenant_id, key).await?;
        self.evict_best_effort(&scoped).await;
        if rows == 0 {
            return Err(KeystashError::not_found(tenant_id, key));
        }
        Ok(())
    }

    // ========================================================================
    // BATCH CREATE
    // ========================================================================

    /// Create up to `batch_limit` objects in input order.
    ///
    /// Existing keys are reported under `duplicates` and skipped. Any other
    /// per-item failure stops the batch; items created before it stay.
    ///
    /// # Errors
    /// - `Validation` if the batch is too large or an item is malformed,
    ///   before anything is written
    /// - `Validation` naming the key if an insert violates a store constraint
    /// - `QuotaExceeded` when an item does not fit
    pub async fn batch_create(
        &self,
        tenant_id: TenantId,
        items: Vec<CreateObjectRequest>,
    ) -> KeystashResult<BatchCreateResponse> {
        let result = self.batch_create_inner(tenant_id, items).await;
        record_outcome("batch_create", &result);
        result
    }

    async fn batch_create_inner(
        &self,
        tenant_id: TenantId,
        items: Vec<CreateObjectRequest>,
    ) -> KeystashResult<BatchCreateResponse> {
        if items.len() > self.config.batch_limit {
            return Err(ValidationError::BatchLimitExceeded {
                limit: self.config.batch_limit,
                got: items.len(),
            }
            .into());
        }

        let now = self.clock.unix_now();
        for item in &items {
            self.validate(item, now)
                .map_err(|e| ValidationError::BatchItemRejected {
                    key: item.key.clone(),
                    reason: e.to_string(),
                })?;
        }
        let tenant = self.tenant(tenant_id).await?;

        let mut created = Vec::new();
        let mut duplicates = Vec::new();

        for item in items {
            let key = item.key.clone();
            if self.find_live(tenant_id, &key, now).await?.is_some() {
                duplicates.push(key);
                continue;
            }

            match self.insert_within_quota(&tenant, item, now).await {
                Ok(record) => {
                    self.fill_cache(&record, now).await;
                    created.push(key);
                }
                Err(e) if e.kind() == ErrorKind::Conflict => duplicates.push(key),
                Err(KeystashError::Storage(StorageError::ConstraintViolation { reason, .. })) => {
                    tracing::warn!(tenant_id = %tenant_id, key = %key, created = created.len(), "Batch aborted on rejected item");
                    return Err(ValidationError::BatchItemRejected { key, reason }.into());
                }
                Err(e) => {
                    tracing::warn!(tenant_id = %tenant_id, key = %key, created = created.len(), error = %e, "Batch aborted");
                    return Err(e);
                }
            }
        }

        Ok(BatchCreateResponse::new(created, duplicates))
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn validate(&self, request: &CreateObjectRequest, now: UnixSeconds) -> Result<(), ValidationError> {
        validate_key(&request.key, self.config.max_key_len)?;
        validate_ttl(request.ttl, now)
    }

    async fn tenant(&self, tenant_id: TenantId) -> KeystashResult<Tenant> {
        self.tenants
            .get_tenant(tenant_id)
            .await?
            .ok_or(KeystashError::TenantNotFound { tenant_id })
    }

    /// Look up a key, reclaiming it first if it is expired.
    async fn find_live(
        &self,
        tenant_id: TenantId,
        key: &str,
        now: UnixSeconds,
    ) -> KeystashResult<Option<Record>> {
        match self.store.find_by_key(tenant_id, key).await? {
            Some(record) if record.is_expired(now) => {
                self.store.delete_if_expired(tenant_id, key, now).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    fn quota_lock(&self, tenant_id: TenantId) -> Arc<Mutex<()>> {
        self.quota_locks.entry(tenant_id).or_default().clone()
    }

    /// Check usage and insert under the tenant's quota lock.
    async fn insert_within_quota(
        &self,
        tenant: &Tenant,
        request: CreateObjectRequest,
        now: UnixSeconds,
    ) -> KeystashResult<Record> {
        let record = Record::new(
            tenant.tenant_id,
            request.key,
            request.data,
            request.ttl,
            self.clock.now(),
        );

        let lock = self.quota_lock(tenant.tenant_id);
        let _guard = lock.lock().await;

        let usage = self.store.usage_bytes(tenant.tenant_id, now).await?;
        if !tenant.has_room_for(usage, record.size_bytes) {
            return Err(KeystashError::QuotaExceeded {
                tenant_id: tenant.tenant_id,
                usage_bytes: usage,
                requested_bytes: record.size_bytes,
                limit_bytes: tenant.tenant_limit_bytes,
            });
        }

        self.store.insert_if_absent(&record).await
    }

    async fn read_cache(&self, scoped: &TenantScopedKey) -> Option<Value> {
        let label = match self.cache.get(scoped).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(value) => {
                    if let Some(m) = metrics() {
                        m.record_cache_lookup("hit");
                    }
                    tracing::debug!(key = %scoped.key(), "Cache hit");
                    return Some(value);
                }
                Err(e) => {
                    tracing::warn!(key = %scoped.key(), error = %e, "Discarding undecodable cache entry");
                    self.evict_best_effort(scoped).await;
                    "error"
                }
            },
            Ok(None) => "miss",
            Err(e) => {
                tracing::warn!(key = %scoped.key(), error = %e, backend = self.cache.backend_type(), "Cache read failed, using store");
                "error"
            }
        };
        if let Some(m) = metrics() {
            m.record_cache_lookup(label);
        }
        None
    }

    /// Cache a record that carries a ttl, for no longer than it has left.
    ///
    /// The store is read again after the write. If the record was deleted or
    /// replaced since it was loaded, the entry is evicted. Deletes evict
    /// after the store commit, so either that eviction or this check removes
    /// a value filled from a stale read.
    async fn fill_cache(&self, record: &Record, now: UnixSeconds) {
        let Some(ttl_secs) = record.remaining_ttl_secs(now) else {
            return;
        };
        let bytes = match serde_json::to_vec(&record.data) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key = %record.key, error = %e, "Could not encode value for cache");
                return;
            }
        };
        let scoped = TenantScopedKey::new(record.tenant_id, record.key.as_str());
        if let Err(e) = self.cache.set_with_expiry(&scoped, &bytes, ttl_secs).await {
            tracing::warn!(key = %record.key, error = %e, "Cache fill failed");
            return;
        }

        match self.store.find_by_key(record.tenant_id, &record.key).await {
            Ok(Some(current)) if current == *record => {}
            Ok(_) => {
                tracing::debug!(key = %record.key, "Record changed during cache fill, evicting");
                self.evict_best_effort(&scoped).await;
            }
            Err(e) => {
                tracing::warn!(key = %record.key, error = %e, "Could not confirm cache fill, evicting");
                self.evict_best_effort(&scoped).await;
            }
        }
    }

    async fn evict_best_effort(&self, scoped: &TenantScopedKey) {
        if let Err(e) = self.cache.delete(scoped).await {
            tracing::warn!(key = %scoped.key(), error = %e, "Cache eviction failed");
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
