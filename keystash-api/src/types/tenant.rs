//! Tenant-related API types

use keystash_core::{Tenant, TenantId, Timestamp};
use serde::{Deserialize, Serialize};

/// Request to provision a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTenantRequest {
    /// Unique tenant name
    pub name: String,
    /// Storage quota in megabytes
    #[serde(default)]
    pub tenant_limit_mb: Option<u64>,
    /// Requests allowed per rate-limit window
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

/// Tenant information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantInfo {
    pub tenant_id: TenantId,
    pub name: String,
    pub tenant_limit_bytes: u64,
    pub rate_limit: u32,
    pub created_at: Timestamp,
}

impl From<Tenant> for TenantInfo {
    fn from(tenant: Tenant) -> Self {
        Self {
            tenant_id: tenant.tenant_id,
            name: tenant.name,
            tenant_limit_bytes: tenant.tenant_limit_bytes,
            rate_limit: tenant.rate_limit,
            created_at: tenant.created_at,
        }
    }
}

/// Response to provisioning. The API key is shown only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTenantResponse {
    pub tenant: TenantInfo,
    pub api_key: String,
}
