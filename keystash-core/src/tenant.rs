//! Tenant quota and isolation boundary

use crate::{TenantId, Timestamp};
use serde::{Deserialize, Serialize};

pub const BYTES_PER_MEGABYTE: u64 = 1024 * 1024;

/// Default quota when provisioning does not specify one.
pub const DEFAULT_TENANT_LIMIT_MB: u64 = 1;

/// Default requests allowed per rate-limit window.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

/// A tenant. Created once by provisioning and never mutated by object operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: TenantId,
    pub name: String,
    /// Maximum aggregate payload size across the tenant's live records.
    pub tenant_limit_bytes: u64,
    /// Requests per rate-limit window.
    pub rate_limit: u32,
    pub created_at: Timestamp,
}

impl Tenant {
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        tenant_limit_bytes: u64,
        rate_limit: u32,
        created_at: Timestamp,
    ) -> Self {
        Self {
            tenant_id,
            name: name.into(),
            tenant_limit_bytes,
            rate_limit,
            created_at,
        }
    }

    /// Quota given in megabytes, as accepted by provisioning.
    pub fn from_megabytes(
        tenant_id: TenantId,
        name: impl Into<String>,
        limit_mb: u64,
        rate_limit: u32,
        created_at: Timestamp,
    ) -> Self {
        Self::new(
            tenant_id,
            name,
            limit_mb.saturating_mul(BYTES_PER_MEGABYTE),
            rate_limit,
            created_at,
        )
    }

    /// Whether `requested` more bytes fit on top of `usage`.
    pub fn has_room_for(&self, usage: u64, requested: u64) -> bool {
        usage.saturating_add(requested) <= self.tenant_limit_bytes
    }
}
