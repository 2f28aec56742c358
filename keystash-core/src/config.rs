//! Object store configuration

use crate::tenant::{DEFAULT_RATE_LIMIT, DEFAULT_TENANT_LIMIT_MB};
use crate::ConfigError;
use serde::{Deserialize, Serialize};

/// Maximum items accepted by one batch create.
pub const BATCH_LIMIT: usize = 50;

/// Maximum key length in bytes.
pub const MAX_KEY_LEN: usize = 256;

/// Limits applied by the object service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub batch_limit: usize,
    pub max_key_len: usize,
    pub default_tenant_limit_mb: u64,
    pub default_rate_limit: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            batch_limit: BATCH_LIMIT,
            max_key_len: MAX_KEY_LEN,
            default_tenant_limit_mb: DEFAULT_TENANT_LIMIT_MB,
            default_rate_limit: DEFAULT_RATE_LIMIT,
        }
    }
}

impl StoreConfig {
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit;
        self
    }

    pub fn with_max_key_len(mut self, len: usize) -> Self {
        self.max_key_len = len;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch_limit".to_string(),
                value: self.batch_limit.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_key_len == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_key_len".to_string(),
                value: self.max_key_len.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.default_rate_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "default_rate_limit".to_string(),
                value: self.default_rate_limit.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
