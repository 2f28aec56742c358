//! Error types for KEYSTASH operations

use crate::TenantId;
use thiserror::Error;

/// Durable store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Constraint violation on {constraint}: {reason}")]
    ConstraintViolation { constraint: String, reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Connection pool exhausted: {reason}")]
    PoolExhausted { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Cache layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend {backend} failed: {reason}")]
    Backend { backend: String, reason: String },

    #[error("Cache entry could not be decoded: {reason}")]
    Serialization { reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Key must not be empty")]
    EmptyKey,

    #[error("Key is {len} bytes, maximum is {max}")]
    KeyTooLong { len: usize, max: usize },

    #[error("TTL {ttl} is not in the future (now {now})")]
    TtlNotInFuture { ttl: i64, now: i64 },

    #[error("Batch of {got} items exceeds the limit of {limit}")]
    BatchLimitExceeded { limit: usize, got: usize },

    #[error("Batch item '{key}' was rejected: {reason}")]
    BatchItemRejected { key: String, reason: String },

    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all KEYSTASH errors.
///
/// The first five variants are domain outcomes a caller can act on. The rest
/// are infrastructure failures and surface as a generic failure.
#[derive(Debug, Clone, Error)]
pub enum KeystashError {
    #[error("Key '{key}' already exists for tenant {tenant_id}")]
    Conflict { tenant_id: TenantId, key: String },

    #[error("Tenant name '{name}' is already taken")]
    TenantNameTaken { name: String },

    #[error("Key '{key}' not found for tenant {tenant_id}")]
    NotFound { tenant_id: TenantId, key: String },

    #[error("Key '{key}' expired for tenant {tenant_id}")]
    Expired { tenant_id: TenantId, key: String },

    #[error("Tenant {tenant_id} not found")]
    TenantNotFound { tenant_id: TenantId },

    #[error(
        "Tenant {tenant_id} quota exceeded: {usage_bytes} used + {requested_bytes} requested > {limit_bytes} limit"
    )]
    QuotaExceeded {
        tenant_id: TenantId,
        usage_bytes: u64,
        requested_bytes: u64,
        limit_bytes: u64,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Coarse classification of a [`KeystashError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Conflict,
    NotFound,
    Validation,
    QuotaExceeded,
    /// Store, cache or configuration failure.
    Internal,
}

impl KeystashError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KeystashError::Conflict { .. } | KeystashError::TenantNameTaken { .. } => {
                ErrorKind::Conflict
            }
            KeystashError::NotFound { .. }
            | KeystashError::Expired { .. }
            | KeystashError::TenantNotFound { .. } => ErrorKind::NotFound,
            KeystashError::Validation(_) => ErrorKind::Validation,
            KeystashError::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            KeystashError::Storage(_) | KeystashError::Cache(_) | KeystashError::Config(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn conflict(tenant_id: TenantId, key: impl Into<String>) -> Self {
        KeystashError::Conflict {
            tenant_id,
            key: key.into(),
        }
    }

    pub fn not_found(tenant_id: TenantId, key: impl Into<String>) -> Self {
        KeystashError::NotFound {
            tenant_id,
            key: key.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Result type alias for KEYSTASH operations.
pub type KeystashResult<T> = Result<T, KeystashError>;

// =============================================================================
// TESTS
// =============================================================================
