//! Durable store and tenant registry traits.
//!
//! The durable store is the system of record for objects. Uniqueness of
//! `(tenant_id, key)` is enforced here, not by callers.

use ::async_trait::async_trait;
use keystash_core::{KeystashResult, Record, Tenant, TenantId, UnixSeconds};

/// Persistent table of records keyed by `(tenant_id, key)`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a record regardless of expiry.
    async fn find_by_key(&self, tenant_id: TenantId, key: &str)
        -> KeystashResult<Option<Record>>;

    /// Insert atomically if no record exists for `(tenant_id, key)`.
    ///
    /// Fails with `KeystashError::Conflict` when one does. Exactly one of
    /// any number of concurrent callers for the same key succeeds.
    async fn insert_if_absent(&self, record: &Record) -> KeystashResult<Record>;

    /// Delete a record. Returns rows affected (0 or 1).
    async fn delete_by_key(&self, tenant_id: TenantId, key: &str) -> KeystashResult<u64>;

    /// Delete a record only if it is expired at `now`.
    ///
    /// A record created concurrently under the same key is left alone.
    async fn delete_if_expired(
        &self,
        tenant_id: TenantId,
        key: &str,
        now: UnixSeconds,
    ) -> KeystashResult<u64>;

    /// All records of a tenant, expired ones included.
    async fn find_all(&self, tenant_id: TenantId) -> KeystashResult<Vec<Record>>;

    /// Delete every record with `ttl < now`. Returns how many went.
    async fn delete_expired(&self, now: UnixSeconds) -> KeystashResult<u64>;

    /// Aggregate payload bytes across the tenant's live records.
    async fn usage_bytes(&self, tenant_id: TenantId, now: UnixSeconds) -> KeystashResult<u64> {
        let records = self.find_all(tenant_id).await?;
        Ok(records
            .iter()
            .filter(|r| r.is_live(now))
            .map(|r| r.size_bytes)
            .sum())
    }

    /// Verify the backend is reachable.
    async fn health_check(&self) -> KeystashResult<()> {
        Ok(())
    }

    fn backend_type(&self) -> &'static str;
}

/// Authoritative mapping from tenant identity to quota and rate limit.
#[async_trait]
pub trait TenantRegistry: Send + Sync {
    /// Register a tenant together with the digest of its API key.
    ///
    /// Fails with `KeystashError::TenantNameTaken` if the name is in use.
    async fn insert_tenant(&self, tenant: &Tenant, credential_digest: &str)
        -> KeystashResult<Tenant>;

    async fn get_tenant(&self, tenant_id: TenantId) -> KeystashResult<Option<Tenant>>;

    /// Look up the tenant owning a presented API key.
    async fn resolve_tenant(&self, credential: &str) -> KeystashResult<Option<Tenant>>;
}
