//! KEYSTASH Test Utilities
//!
//! Shared test infrastructure for the KEYSTASH workspace:
//! - Proptest generators for keys, payloads and records
//! - Test fixtures for tenants, records and seeded registries
//! - Fault-injecting object store and cache backend
//! - Custom assertions on error kinds

pub use keystash_core::{
    credential_digest, ErrorKind, KeystashError, KeystashResult, ManualClock, Record,
    StorageError, Tenant, TenantId, Timestamp, UnixSeconds,
};
pub use keystash_storage::{
    CacheBackend, CacheStats, InMemoryCacheBackend, InMemoryObjectStore, InMemoryTenantRegistry,
    ObjectStore, TenantScopedKey,
};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use keystash_core::{CacheError, Clock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Fixed "now" used by fixtures and clocks in tests.
pub const TEST_NOW: UnixSeconds = 1_700_000_000;

// ============================================================================
// FAULT-INJECTING STORE
// ============================================================================

/// Object store that delegates to an in-memory store but fails chosen
/// operations on demand.
///
/// Faults on insert are keyed by record key so a batch can be made to fail
/// part way through.
#[derive(Default)]
pub struct FaultyObjectStore {
    inner: InMemoryObjectStore,
    insert_faults: Mutex<HashMap<String, StorageError>>,
    usage_fault: Mutex<Option<StorageError>>,
    sweep_fault: Mutex<Option<StorageError>>,
    health_fault: Mutex<Option<StorageError>>,
}

impl FaultyObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every insert of `key` with `error`.
    pub fn fail_insert(&self, key: impl Into<String>, error: StorageError) {
        if let Ok(mut faults) = self.insert_faults.lock() {
            faults.insert(key.into(), error);
        }
    }

    /// Fail every usage query with `error`.
    pub fn fail_usage(&self, error: StorageError) {
        if let Ok(mut fault) = self.usage_fault.lock() {
            *fault = Some(error);
        }
    }

    /// Fail every bulk expiry delete with `error`.
    pub fn fail_sweep(&self, error: StorageError) {
        if let Ok(mut fault) = self.sweep_fault.lock() {
            *fault = Some(error);
        }
    }

    /// Fail health checks with `error`.
    pub fn fail_health(&self, error: StorageError) {
        if let Ok(mut fault) = self.health_fault.lock() {
            *fault = Some(error);
        }
    }

    /// The wrapped store, for assertions.
    pub fn inner(&self) -> &InMemoryObjectStore {
        &self.inner
    }

    fn current_fault(slot: &Mutex<Option<StorageError>>) -> Option<StorageError> {
        slot.lock().ok().and_then(|f| f.clone())
    }
}

#[async_trait]
impl ObjectStore for FaultyObjectStore {
    async fn find_by_key(&self, tenant_id: TenantId, key: &str) -> KeystashResult<Option<Record>> {
        self.inner.find_by_key(tenant_id, key).await
    }

    async fn insert_if_absent(&self, record: &Record) -> KeystashResult<Record> {
        let fault = self
            .insert_faults
            .lock()
            .ok()
            .and_then(|faults| faults.get(&record.key).cloned());
        if let Some(e) = fault {
            return Err(e.into());
        }
        self.inner.insert_if_absent(record).await
    }

    async fn delete_by_key(&self, tenant_id: TenantId, key: &str) -> KeystashResult<u64> {
        self.inner.delete_by_key(tenant_id, key).await
    }

    async fn delete_if_expired(
        &self,
        tenant_id: TenantId,
        key: &str,
        now: UnixSeconds,
    ) -> KeystashResult<u64> {
        self.inner.delete_if_expired(tenant_id, key, now).await
    }

    async fn find_all(&self, tenant_id: TenantId) -> KeystashResult<Vec<Record>> {
        self.inner.find_all(tenant_id).await
    }

    async fn delete_expired(&self, now: UnixSeconds) -> KeystashResult<u64> {
        if let Some(e) = Self::current_fault(&self.sweep_fault) {
            return Err(e.into());
        }
        self.inner.delete_expired(now).await
    }

    async fn usage_bytes(&self, tenant_id: TenantId, now: UnixSeconds) -> KeystashResult<u64> {
        if let Some(e) = Self::current_fault(&self.usage_fault) {
            return Err(e.into());
        }
        self.inner.usage_bytes(tenant_id, now).await
    }

    async fn health_check(&self) -> KeystashResult<()> {
        match Self::current_fault(&self.health_fault) {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn backend_type(&self) -> &'static str {
        "faulty"
    }
}

// ============================================================================
// FAULT-INJECTING CACHE
// ============================================================================

/// Cache backend that delegates to an in-memory cache but can be told to
/// fail reads, writes or deletes.
pub struct FaultyCacheBackend {
    inner: InMemoryCacheBackend,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
}

impl FaultyCacheBackend {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: InMemoryCacheBackend::new(clock),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// The wrapped cache, for seeding and assertions.
    pub fn inner(&self) -> &InMemoryCacheBackend {
        &self.inner
    }

    fn check(flag: &AtomicBool, operation: &str) -> KeystashResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(CacheError::Backend {
                backend: "faulty".to_string(),
                reason: format!("injected {} failure", operation),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for FaultyCacheBackend {
    async fn get(&self, key: &TenantScopedKey) -> KeystashResult<Option<Vec<u8>>> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.get(key).await
    }

    async fn set_with_expiry(
        &self,
        key: &TenantScopedKey,
        value: &[u8],
        ttl_secs: u64,
    ) -> KeystashResult<()> {
        Self::check(&self.fail_writes, "write")?;
        self.inner.set_with_expiry(key, value, ttl_secs).await
    }

    async fn delete(&self, key: &TenantScopedKey) -> KeystashResult<bool> {
        Self::check(&self.fail_deletes, "delete")?;
        self.inner.delete(key).await
    }

    async fn purge_expired(&self) -> KeystashResult<u64> {
        self.inner.purge_expired().await
    }

    async fn stats(&self) -> KeystashResult<CacheStats> {
        self.inner.stats().await
    }

    fn backend_type(&self) -> &'static str {
        "faulty"
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for KEYSTASH inputs.

    use super::*;
    use proptest::prelude::*;

    /// Generate a random tenant id.
    pub fn arb_tenant_id() -> impl Strategy<Value = TenantId> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate a valid key (1-32 chars, including separators real clients use).
    pub fn arb_key() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_./:-]{1,32}"
    }

    /// Generate a small set of distinct valid keys.
    pub fn arb_distinct_keys(max: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::hash_set(arb_key(), 1..=max).prop_map(|s| s.into_iter().collect())
    }

    /// Generate a JSON payload: scalars, arrays and shallow objects.
    pub fn arb_payload() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "[a-zA-Z0-9 ]{0,40}".prop_map(Value::String),
        ];
        leaf.prop_recursive(2, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::hash_map("[a-z]{1,8}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    /// Generate a ttl offset relative to `TEST_NOW`: past, present or future.
    pub fn arb_ttl_offset() -> impl Strategy<Value = i64> {
        -86_400i64..86_400i64
    }

    /// Generate a record for `tenant_id`, with or without a ttl.
    pub fn arb_record(tenant_id: TenantId) -> impl Strategy<Value = Record> {
        (arb_key(), arb_payload(), prop::option::of(arb_ttl_offset())).prop_map(
            move |(key, data, offset)| {
                fixtures::record(tenant_id, &key, data, offset.map(|o| TEST_NOW + o))
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common scenarios.

    use super::*;

    /// A clock fixed at `TEST_NOW`.
    pub fn test_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::at_unix(TEST_NOW))
    }

    /// A tenant with the given quota in bytes and a generous rate limit.
    pub fn tenant(limit_bytes: u64) -> Tenant {
        Tenant::new(Uuid::now_v7(), format!("tenant-{}", Uuid::now_v7()), limit_bytes, 1_000, Utc::now())
    }

    /// A tenant with the given quota and rate limit.
    pub fn tenant_with_rate(limit_bytes: u64, rate_limit: u32) -> Tenant {
        Tenant {
            rate_limit,
            ..tenant(limit_bytes)
        }
    }

    /// A record created at `TEST_NOW`.
    pub fn record(tenant_id: TenantId, key: &str, data: Value, ttl: Option<UnixSeconds>) -> Record {
        let created_at = chrono::DateTime::from_timestamp(TEST_NOW, 0).unwrap_or_else(Utc::now);
        Record::new(tenant_id, key, data, ttl, created_at)
    }

    /// A payload whose serialized form is exactly `bytes` long (minimum 10).
    pub fn payload_of_size(bytes: usize) -> Value {
        // {"p":"..."} carries 8 bytes of framing
        let filler = bytes.saturating_sub(8).max(2);
        serde_json::json!({ "p": "x".repeat(filler) })
    }

    /// Registry holding `tenant`, reachable with `api_key`.
    pub async fn registry_with(
        tenant: &Tenant,
        api_key: &str,
    ) -> KeystashResult<Arc<InMemoryTenantRegistry>> {
        use keystash_storage::TenantRegistry;

        let registry = Arc::new(InMemoryTenantRegistry::new());
        registry
            .insert_tenant(tenant, &credential_digest(api_key))
            .await?;
        Ok(registry)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on KEYSTASH results.

    use super::*;

    /// Assert that a result failed with the given error kind.
    #[track_caller]
    pub fn assert_kind<T: std::fmt::Debug>(result: &KeystashResult<T>, expected: ErrorKind) {
        match result {
            Err(e) => assert_eq!(e.kind(), expected, "wrong error kind for {:?}", e),
            Ok(v) => panic!("Expected {:?} error, got Ok({:?})", expected, v),
        }
    }

    /// Assert that a result is a conflict.
    #[track_caller]
    pub fn assert_conflict<T: std::fmt::Debug>(result: &KeystashResult<T>) {
        assert_kind(result, ErrorKind::Conflict);
    }

    /// Assert that a result is not-found (expired included).
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &KeystashResult<T>) {
        assert_kind(result, ErrorKind::NotFound);
    }

    /// Assert that a result is a validation failure.
    #[track_caller]
    pub fn assert_validation<T: std::fmt::Debug>(result: &KeystashResult<T>) {
        assert_kind(result, ErrorKind::Validation);
    }

    /// Assert that a result is a quota failure.
    #[track_caller]
    pub fn assert_quota_exceeded<T: std::fmt::Debug>(result: &KeystashResult<T>) {
        assert_kind(result, ErrorKind::QuotaExceeded);
    }
}

// ============================================================================
// TESTS
// ============================================================================
