//! Object-related API types

use keystash_core::{Record, TenantId, Timestamp, UnixSeconds};
use serde::{Deserialize, Serialize};

/// Request to create a single object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateObjectRequest {
    /// Key, unique within the tenant
    pub key: String,
    /// Arbitrary JSON payload
    pub data: serde_json::Value,
    /// Absolute expiry in unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<UnixSeconds>,
}

impl CreateObjectRequest {
    pub fn new(key: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            data,
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: UnixSeconds) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// A stored object as returned by create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectResponse {
    pub tenant_id: TenantId,
    pub key: String,
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<UnixSeconds>,
    pub size_bytes: u64,
    pub created_at: Timestamp,
}

impl From<Record> for ObjectResponse {
    fn from(record: Record) -> Self {
        Self {
            tenant_id: record.tenant_id,
            key: record.key,
            data: record.data,
            ttl: record.ttl,
            size_bytes: record.size_bytes,
            created_at: record.created_at,
        }
    }
}

/// Value returned by a read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectValueResponse {
    pub key: String,
    pub data: serde_json::Value,
}

/// Plain confirmation body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
