//! KEYSTASH Core - Entity Types
//!
//! Records, tenants, the error taxonomy and the clock seam. Every other
//! crate in the workspace depends on this one.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

mod clock;
mod config;
mod error;
mod record;
mod tenant;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{StoreConfig, BATCH_LIMIT, MAX_KEY_LEN};
pub use error::{
    CacheError, ConfigError, ErrorKind, KeystashError, KeystashResult, StorageError,
    ValidationError,
};
pub use record::Record;
pub use tenant::{Tenant, BYTES_PER_MEGABYTE, DEFAULT_RATE_LIMIT, DEFAULT_TENANT_LIMIT_MB};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Tenant identifier (UUIDv7, timestamp-sortable).
pub type TenantId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Seconds since the unix epoch. Record expiry is expressed in this unit.
pub type UnixSeconds = i64;

/// SHA-256 digest of an API credential, hex encoded.
pub type CredentialDigest = String;

/// Generate a new tenant id.
pub fn new_tenant_id() -> TenantId {
    Uuid::now_v7()
}

// ============================================================================
// HELPERS
// ============================================================================

/// Serialized byte length of a payload. This is what quotas are charged.
pub fn payload_size(data: &Value) -> u64 {
    serde_json::to_vec(data).map(|v| v.len() as u64).unwrap_or(0)
}

/// Digest a presented API credential for storage and lookup.
pub fn credential_digest(credential: &str) -> CredentialDigest {
    let mut hasher = Sha256::new();
    hasher.update(credential.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check a key against the structural limits.
pub fn validate_key(key: &str, max_len: usize) -> Result<(), ValidationError> {
    if key.is_empty() {
        return Err(ValidationError::EmptyKey);
    }
    if key.len() > max_len {
        return Err(ValidationError::KeyTooLong {
            len: key.len(),
            max: max_len,
        });
    }
    Ok(())
}

/// A ttl supplied at creation must lie strictly in the future.
pub fn validate_ttl(ttl: Option<UnixSeconds>, now: UnixSeconds) -> Result<(), ValidationError> {
    match ttl {
        Some(ttl) if ttl <= now => Err(ValidationError::TtlNotInFuture { ttl, now }),
        _ => Ok(()),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_size() {
        assert_eq!(payload_size(&json!({"a": 1})), 7);
        assert_eq!(payload_size(&json!("x")), 3);
        assert_eq!(payload_size(&Value::Null), 4);
    }

    #[test]
    fn test_credential_digest_is_stable_hex() {
        let a = credential_digest("secret");
        let b = credential_digest("secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, credential_digest("other"));
    }

    #[test]
    fn test_validate_key() {
        assert_eq!(validate_key("", 10), Err(ValidationError::EmptyKey));
        assert!(validate_key("abc", 10).is_ok());
        assert_eq!(
            validate_key("abcdefghijk", 10),
            Err(ValidationError::KeyTooLong { len: 11, max: 10 })
        );
    }

    #[test]
    fn test_validate_ttl() {
        assert!(validate_ttl(None, 100).is_ok());
        assert!(validate_ttl(Some(101), 100).is_ok());
        assert!(validate_ttl(Some(100), 100).is_err());
        assert!(validate_ttl(Some(5), 100).is_err());
    }
}
