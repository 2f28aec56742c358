//! Stored key/value records

use crate::{payload_size, TenantId, Timestamp, UnixSeconds};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single stored object. Unique per `(tenant_id, key)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub tenant_id: TenantId,
    pub key: String,
    pub data: Value,
    /// Absolute expiry in unix seconds. `None` never expires.
    pub ttl: Option<UnixSeconds>,
    /// Serialized length of `data`, fixed at creation.
    pub size_bytes: u64,
    pub created_at: Timestamp,
}

impl Record {
    /// Build a record, measuring `data` once.
    pub fn new(
        tenant_id: TenantId,
        key: impl Into<String>,
        data: Value,
        ttl: Option<UnixSeconds>,
        created_at: Timestamp,
    ) -> Self {
        let size_bytes = payload_size(&data);
        Self {
            tenant_id,
            key: key.into(),
            data,
            ttl,
            size_bytes,
            created_at,
        }
    }

    /// Logically absent once `ttl < now`.
    pub fn is_expired(&self, now: UnixSeconds) -> bool {
        matches!(self.ttl, Some(ttl) if ttl < now)
    }

    /// Seconds left before expiry, if the record expires and has time left.
    pub fn remaining_ttl_secs(&self, now: UnixSeconds) -> Option<u64> {
        let ttl = self.ttl?;
        if ttl > now {
            Some((ttl - now) as u64)
        } else {
            None
        }
    }

    /// Whether this record counts toward its tenant's usage at `now`.
    pub fn is_live(&self, now: UnixSeconds) -> bool {
        !self.is_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn record(ttl: Option<i64>) -> Record {
        Record::new(Uuid::now_v7(), "k1", json!({"a": 1}), ttl, Utc::now())
    }

    #[test]
    fn test_size_is_serialized_length() {
        let r = record(None);
        assert_eq!(r.size_bytes, br#"{"a":1}"#.len() as u64);
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let r = record(None);
        assert!(!r.is_expired(i64::MAX));
        assert_eq!(r.remaining_ttl_secs(0), None);
    }

    #[test]
    fn test_expiry_is_strict() {
        let r = record(Some(100));
        assert!(!r.is_expired(99));
        assert!(!r.is_expired(100));
        assert!(r.is_expired(101));
    }

    #[test]
    fn test_remaining_ttl() {
        let r = record(Some(100));
        assert_eq!(r.remaining_ttl_secs(40), Some(60));
        assert_eq!(r.remaining_ttl_secs(100), None);
        assert_eq!(r.remaining_ttl_secs(150), None);
    }
}
