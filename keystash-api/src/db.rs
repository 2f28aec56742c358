//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling via deadpool-postgres, and `PgStore`, the
//! durable object store and tenant registry.
//!
//! Uniqueness of `(tenant_id, key)` is enforced by the primary key, so the
//! insert is a single `ON CONFLICT DO NOTHING` statement and never a
//! check-then-act pair.

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, PoolError, RecyclingMethod, Runtime};
use keystash_core::{
    credential_digest, KeystashError, KeystashResult, Record, StorageError, Tenant, TenantId,
    UnixSeconds,
};
use keystash_storage::{ObjectStore, TenantRegistry};
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::{NoTls, Row};

use crate::constants::{
    DEFAULT_DB_HOST, DEFAULT_DB_NAME, DEFAULT_DB_POOL_SIZE, DEFAULT_DB_PORT,
    DEFAULT_DB_TIMEOUT_SECS, DEFAULT_DB_USER,
};
use crate::error::{ApiError, ApiResult};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait timeout for a pooled connection
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            dbname: DEFAULT_DB_NAME.to_string(),
            user: DEFAULT_DB_USER.to_string(),
            password: String::new(),
            max_size: DEFAULT_DB_POOL_SIZE,
            timeout: Duration::from_secs(DEFAULT_DB_TIMEOUT_SECS),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("KEYSTASH_DB_HOST").unwrap_or_else(|_| DEFAULT_DB_HOST.to_string()),
            port: std::env::var("KEYSTASH_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DB_PORT),
            dbname: std::env::var("KEYSTASH_DB_NAME").unwrap_or_else(|_| DEFAULT_DB_NAME.to_string()),
            user: std::env::var("KEYSTASH_DB_USER").unwrap_or_else(|_| DEFAULT_DB_USER.to_string()),
            password: std::env::var("KEYSTASH_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("KEYSTASH_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DB_POOL_SIZE),
            timeout: Duration::from_secs(
                std::env::var("KEYSTASH_DB_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DB_TIMEOUT_SECS),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        pool_cfg.timeouts.create = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tenants (
    tenant_id          UUID PRIMARY KEY,
    name               TEXT NOT NULL UNIQUE,
    credential_digest  TEXT NOT NULL UNIQUE,
    tenant_limit_bytes BIGINT NOT NULL CHECK (tenant_limit_bytes > 0),
    rate_limit         INTEGER NOT NULL CHECK (rate_limit > 0),
    created_at         TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS kv_store (
    tenant_id  UUID NOT NULL REFERENCES tenants (tenant_id) ON DELETE CASCADE,
    key        TEXT NOT NULL CHECK (length(key) > 0),
    data       JSONB NOT NULL,
    size_bytes BIGINT NOT NULL,
    ttl        BIGINT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (tenant_id, key)
);

CREATE INDEX IF NOT EXISTS kv_store_ttl_idx ON kv_store (ttl) WHERE ttl IS NOT NULL;
"#;

const TENANT_NAME_CONSTRAINT: &str = "tenants_name_key";

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn pool_error(e: PoolError) -> KeystashError {
    StorageError::PoolExhausted {
        reason: e.to_string(),
    }
    .into()
}

/// Map a driver error. Integrity violations become constraint errors;
/// everything else is a failed query.
fn query_error(e: tokio_postgres::Error) -> KeystashError {
    if let Some(db_error) = e.as_db_error() {
        if db_error.code().code().starts_with("23") {
            return StorageError::ConstraintViolation {
                constraint: db_error.constraint().unwrap_or("unknown").to_string(),
                reason: db_error.message().to_string(),
            }
            .into();
        }
    }
    StorageError::QueryFailed {
        reason: e.to_string(),
    }
    .into()
}

fn to_i64(value: u64, field: &str) -> KeystashResult<i64> {
    i64::try_from(value).map_err(|_| {
        StorageError::Serialization {
            reason: format!("{} out of range: {}", field, value),
        }
        .into()
    })
}

fn to_u64(value: i64, field: &str) -> KeystashResult<u64> {
    u64::try_from(value).map_err(|_| {
        StorageError::Serialization {
            reason: format!("{} is negative: {}", field, value),
        }
        .into()
    })
}

fn record_from_row(row: &Row) -> KeystashResult<Record> {
    let size_bytes: i64 = row.try_get("size_bytes").map_err(query_error)?;
    Ok(Record {
        tenant_id: row.try_get("tenant_id").map_err(query_error)?,
        key: row.try_get("key").map_err(query_error)?,
        data: row.try_get("data").map_err(query_error)?,
        ttl: row.try_get("ttl").map_err(query_error)?,
        size_bytes: to_u64(size_bytes, "size_bytes")?,
        created_at: row.try_get("created_at").map_err(query_error)?,
    })
}

fn tenant_from_row(row: &Row) -> KeystashResult<Tenant> {
    let limit: i64 = row.try_get("tenant_limit_bytes").map_err(query_error)?;
    let rate: i32 = row.try_get("rate_limit").map_err(query_error)?;
    Ok(Tenant {
        tenant_id: row.try_get("tenant_id").map_err(query_error)?,
        name: row.try_get("name").map_err(query_error)?,
        tenant_limit_bytes: to_u64(limit, "tenant_limit_bytes")?,
        rate_limit: u32::try_from(rate).map_err(|_| StorageError::Serialization {
            reason: format!("rate_limit is negative: {}", rate),
        })?,
        created_at: row.try_get("created_at").map_err(query_error)?,
    })
}

// ============================================================================
// POSTGRES STORE
// ============================================================================

/// PostgreSQL-backed object store and tenant registry.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a store from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    async fn get_conn(&self) -> KeystashResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(pool_error)
    }

    /// Create tables and indexes if they do not exist.
    pub async fn ensure_schema(&self) -> KeystashResult<()> {
        let conn = self.get_conn().await?;
        conn.batch_execute(SCHEMA).await.map_err(query_error)?;
        tracing::info!("Database schema ready");
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for PgStore {
    async fn find_by_key(&self, tenant_id: TenantId, key: &str) -> KeystashResult<Option<Record>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                "SELECT tenant_id, key, data, size_bytes, ttl, created_at \
                 FROM kv_store WHERE tenant_id = $1 AND key = $2",
                &[&tenant_id, &key],
            )
            .await
            .map_err(query_error)?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn insert_if_absent(&self, record: &Record) -> KeystashResult<Record> {
        let conn = self.get_conn().await?;
        let size_bytes = to_i64(record.size_bytes, "size_bytes")?;
        let row = conn
            .query_opt(
                "INSERT INTO kv_store (tenant_id, key, data, size_bytes, ttl, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (tenant_id, key) DO NOTHING \
                 RETURNING tenant_id, key, data, size_bytes, ttl, created_at",
                &[
                    &record.tenant_id,
                    &record.key,
                    &record.data,
                    &size_bytes,
                    &record.ttl,
                    &record.created_at,
                ],
            )
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => record_from_row(&row),
            None => Err(KeystashError::conflict(record.tenant_id, record.key.as_str())),
        }
    }

    async fn delete_by_key(&self, tenant_id: TenantId, key: &str) -> KeystashResult<u64> {
        let conn = self.get_conn().await?;
        conn.execute(
            "DELETE FROM kv_store WHERE tenant_id = $1 AND key = $2",
            &[&tenant_id, &key],
        )
        .await
        .map_err(query_error)
    }

    async fn delete_if_expired(
        &self,
        tenant_id: TenantId,
        key: &str,
        now: UnixSeconds,
    ) -> KeystashResult<u64> {
        let conn = self.get_conn().await?;
        conn.execute(
            "DELETE FROM kv_store WHERE tenant_id = $1 AND key = $2 \
             AND ttl IS NOT NULL AND ttl < $3",
            &[&tenant_id, &key, &now],
        )
        .await
        .map_err(query_error)
    }

    async fn find_all(&self, tenant_id: TenantId) -> KeystashResult<Vec<Record>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT tenant_id, key, data, size_bytes, ttl, created_at \
                 FROM kv_store WHERE tenant_id = $1 ORDER BY created_at, key",
                &[&tenant_id],
            )
            .await
            .map_err(query_error)?;
        rows.iter().map(record_from_row).collect()
    }

    async fn delete_expired(&self, now: UnixSeconds) -> KeystashResult<u64> {
        let conn = self.get_conn().await?;
        conn.execute(
            "DELETE FROM kv_store WHERE ttl IS NOT NULL AND ttl < $1",
            &[&now],
        )
        .await
        .map_err(query_error)
    }

    async fn usage_bytes(&self, tenant_id: TenantId, now: UnixSeconds) -> KeystashResult<u64> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                "SELECT COALESCE(SUM(size_bytes), 0)::BIGINT FROM kv_store \
                 WHERE tenant_id = $1 AND (ttl IS NULL OR ttl >= $2)",
                &[&tenant_id, &now],
            )
            .await
            .map_err(query_error)?;
        let total: i64 = row.try_get(0).map_err(query_error)?;
        to_u64(total, "usage")
    }

    async fn health_check(&self) -> KeystashResult<()> {
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[]).await.map_err(query_error)?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl TenantRegistry for PgStore {
    async fn insert_tenant(&self, tenant: &Tenant, credential_digest: &str) -> KeystashResult<Tenant> {
        let conn = self.get_conn().await?;
        let limit = to_i64(tenant.tenant_limit_bytes, "tenant_limit_bytes")?;
        let rate = i32::try_from(tenant.rate_limit).map_err(|_| StorageError::Serialization {
            reason: format!("rate_limit out of range: {}", tenant.rate_limit),
        })?;

        let result = conn
            .query_one(
                "INSERT INTO tenants (tenant_id, name, credential_digest, tenant_limit_bytes, rate_limit, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 RETURNING tenant_id, name, tenant_limit_bytes, rate_limit, created_at",
                &[
                    &tenant.tenant_id,
                    &tenant.name,
                    &credential_digest,
                    &limit,
                    &rate,
                    &tenant.created_at,
                ],
            )
            .await;

        match result {
            Ok(row) => tenant_from_row(&row),
            Err(e) => {
                let name_taken = e.as_db_error().is_some_and(|db| {
                    db.code() == &SqlState::UNIQUE_VIOLATION
                        && db.constraint() == Some(TENANT_NAME_CONSTRAINT)
                });
                if name_taken {
                    Err(KeystashError::TenantNameTaken {
                        name: tenant.name.clone(),
                    })
                } else {
                    Err(query_error(e))
                }
            }
        }
    }

    async fn get_tenant(&self, tenant_id: TenantId) -> KeystashResult<Option<Tenant>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                "SELECT tenant_id, name, tenant_limit_bytes, rate_limit, created_at \
                 FROM tenants WHERE tenant_id = $1",
                &[&tenant_id],
            )
            .await
            .map_err(query_error)?;
        row.as_ref().map(tenant_from_row).transpose()
    }

    async fn resolve_tenant(&self, credential: &str) -> KeystashResult<Option<Tenant>> {
        let digest = credential_digest(credential);
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                "SELECT tenant_id, name, tenant_limit_bytes, rate_limit, created_at \
                 FROM tenants WHERE credential_digest = $1",
                &[&digest],
            )
            .await
            .map_err(query_error)?;
        row.as_ref().map(tenant_from_row).transpose()
    }
}

// ============================================================================
// TESTS
// ============================================================================
