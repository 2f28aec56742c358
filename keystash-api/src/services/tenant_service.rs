//! Tenant Service
//!
//! Provisions tenants and issues their API keys. Only the key's digest is
//! stored; the plaintext is returned once, in the provisioning response.

use std::sync::Arc;

use keystash_core::{
    credential_digest, new_tenant_id, Clock, KeystashResult, StoreConfig, Tenant, ValidationError,
};
use keystash_storage::TenantRegistry;

use crate::constants::API_KEY_BYTES;
use crate::types::CreateTenantRequest;

/// Generate a fresh API key: 32 random bytes, hex encoded.
pub fn generate_api_key() -> String {
    let bytes: [u8; API_KEY_BYTES] = rand::random();
    hex::encode(bytes)
}

pub struct TenantService {
    registry: Arc<dyn TenantRegistry>,
    clock: Arc<dyn Clock>,
    config: StoreConfig,
}

impl TenantService {
    pub fn new(registry: Arc<dyn TenantRegistry>, clock: Arc<dyn Clock>, config: StoreConfig) -> Self {
        Self {
            registry,
            clock,
            config,
        }
    }

    /// Create a tenant and return it with its plaintext API key.
    ///
    /// # Errors
    /// - `Validation` for a blank name or a zero quota or rate limit
    /// - `TenantNameTaken` if the name is already registered
    pub async fn provision(&self, request: CreateTenantRequest) -> KeystashResult<(Tenant, String)> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "name".to_string(),
            }
            .into());
        }

        let limit_mb = request
            .tenant_limit_mb
            .unwrap_or(self.config.default_tenant_limit_mb);
        if limit_mb == 0 {
            return Err(ValidationError::InvalidValue {
                field: "tenant_limit_mb".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }

        let rate_limit = request.rate_limit.unwrap_or(self.config.default_rate_limit);
        if rate_limit == 0 {
            return Err(ValidationError::InvalidValue {
                field: "rate_limit".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }

        let tenant = Tenant::from_megabytes(
            new_tenant_id(),
            name,
            limit_mb,
            rate_limit,
            self.clock.now(),
        );
        let api_key = generate_api_key();
        let stored = self
            .registry
            .insert_tenant(&tenant, &credential_digest(&api_key))
            .await?;

        tracing::info!(tenant_id = %stored.tenant_id, name = %stored.name, "Tenant provisioned");
        Ok((stored, api_key))
    }

    /// Resolve a presented API key to its tenant.
    pub async fn authenticate(&self, api_key: &str) -> KeystashResult<Option<Tenant>> {
        self.registry.resolve_tenant(api_key).await
    }
}
