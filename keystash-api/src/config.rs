//! API Configuration Module
//!
//! Server, backend selection, CORS and rate limiting settings. Configuration
//! is loaded from environment variables with defaults suited to development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use keystash_core::ConfigError;

use crate::constants::{
    DEFAULT_BIND_ADDR, DEFAULT_CACHE_MAP_SIZE_MB, DEFAULT_CACHE_PATH, DEFAULT_CORS_MAX_AGE_SECS,
    DEFAULT_PORT, DEFAULT_RATE_LIMIT_WINDOW_SECS,
};

// ============================================================================
// BACKEND SELECTION
// ============================================================================

/// Durable store implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(ConfigError::InvalidValue {
                field: "KEYSTASH_STORE_BACKEND".to_string(),
                value: other.to_string(),
                reason: "expected memory or postgres".to_string(),
            }),
        }
    }
}

/// Cache implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Memory,
    Lmdb,
}

impl FromStr for CacheBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(CacheBackendKind::Memory),
            "lmdb" => Ok(CacheBackendKind::Lmdb),
            other => Err(ConfigError::InvalidValue {
                field: "KEYSTASH_CACHE_BACKEND".to_string(),
                value: other.to_string(),
                reason: "expected memory or lmdb".to_string(),
            }),
        }
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration for the server, its backends, CORS and rate limiting.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Address the server binds to.
    pub bind_addr: String,
    pub port: u16,

    pub store_backend: StoreBackend,
    pub cache_backend: CacheBackendKind,
    /// LMDB environment directory.
    pub cache_path: PathBuf,
    /// LMDB map size in megabytes.
    pub cache_map_size_mb: usize,

    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// Whether per-tenant rate limiting is enabled.
    pub rate_limit_enabled: bool,

    /// Window a tenant's `rate_limit` applies to.
    pub rate_limit_window: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            port: DEFAULT_PORT,
            store_backend: StoreBackend::Memory,
            cache_backend: CacheBackendKind::Memory,
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            cache_map_size_mb: DEFAULT_CACHE_MAP_SIZE_MB,
            cors_origins: Vec::new(),
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
            rate_limit_enabled: true,
            rate_limit_window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        }
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `KEYSTASH_BIND_ADDR` / `KEYSTASH_PORT`: Listen address (default: 0.0.0.0:3000)
    /// - `KEYSTASH_STORE_BACKEND`: `memory` or `postgres` (default: memory)
    /// - `KEYSTASH_CACHE_BACKEND`: `memory` or `lmdb` (default: memory)
    /// - `KEYSTASH_CACHE_PATH`: LMDB directory (default: ./data/cache)
    /// - `KEYSTASH_CACHE_MAP_SIZE_MB`: LMDB map size (default: 256)
    /// - `KEYSTASH_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `KEYSTASH_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `KEYSTASH_RATE_LIMIT_ENABLED`: "true" or "false" (default: true)
    /// - `KEYSTASH_RATE_LIMIT_WINDOW_SECS`: Rate limit window (default: 60)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let store_backend = match std::env::var("KEYSTASH_STORE_BACKEND") {
            Ok(s) => s.parse()?,
            Err(_) => defaults.store_backend,
        };
        let cache_backend = match std::env::var("KEYSTASH_CACHE_BACKEND") {
            Ok(s) => s.parse()?,
            Err(_) => defaults.cache_backend,
        };

        let cors_origins = std::env::var("KEYSTASH_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let rate_limit_enabled = std::env::var("KEYSTASH_RATE_LIMIT_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        let config = Self {
            bind_addr: std::env::var("KEYSTASH_BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: env_parse("KEYSTASH_PORT", defaults.port),
            store_backend,
            cache_backend,
            cache_path: std::env::var("KEYSTASH_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_path),
            cache_map_size_mb: env_parse("KEYSTASH_CACHE_MAP_SIZE_MB", defaults.cache_map_size_mb),
            cors_origins,
            cors_max_age_secs: env_parse("KEYSTASH_CORS_MAX_AGE_SECS", defaults.cors_max_age_secs),
            rate_limit_enabled,
            rate_limit_window: Duration::from_secs(env_parse(
                "KEYSTASH_RATE_LIMIT_WINDOW_SECS",
                DEFAULT_RATE_LIMIT_WINDOW_SECS,
            )),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit_window.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "KEYSTASH_RATE_LIMIT_WINDOW_SECS".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        // LMDB outlives the process; a memory store does not.
        if self.cache_backend == CacheBackendKind::Lmdb && self.store_backend == StoreBackend::Memory {
            return Err(ConfigError::InvalidValue {
                field: "KEYSTASH_CACHE_BACKEND".to_string(),
                value: "lmdb".to_string(),
                reason: "a persistent cache requires the postgres store".to_string(),
            });
        }
        if self.cache_backend == CacheBackendKind::Lmdb && self.cache_map_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "KEYSTASH_CACHE_MAP_SIZE_MB".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        self.socket_addr().map(|_| ())
    }

    /// Parsed listen address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                field: "KEYSTASH_BIND_ADDR".to_string(),
                value: self.bind_addr.clone(),
                reason: e.to_string(),
            })
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }
        self.cors_origins.iter().any(|allowed| allowed == origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.cache_backend, CacheBackendKind::Memory);
        assert!(config.cors_origins.is_empty());
        assert!(config.rate_limit_enabled);
        assert_eq!(config.rate_limit_window, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("postgres".parse::<StoreBackend>().ok(), Some(StoreBackend::Postgres));
        assert_eq!(" Memory ".parse::<StoreBackend>().ok(), Some(StoreBackend::Memory));
        assert!("redis".parse::<StoreBackend>().is_err());
        assert_eq!("lmdb".parse::<CacheBackendKind>().ok(), Some(CacheBackendKind::Lmdb));
        assert!("disk".parse::<CacheBackendKind>().is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = ApiConfig::default();
        assert_eq!(config.socket_addr().map(|a| a.port()).ok(), Some(3000));

        let bad = ApiConfig {
            bind_addr: "not an address".to_string(),
            ..ApiConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_lmdb_cache_requires_durable_store() {
        let over_memory = ApiConfig {
            cache_backend: CacheBackendKind::Lmdb,
            ..ApiConfig::default()
        };
        assert!(matches!(
            over_memory.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "KEYSTASH_CACHE_BACKEND"
        ));

        let over_postgres = ApiConfig {
            store_backend: StoreBackend::Postgres,
            cache_backend: CacheBackendKind::Lmdb,
            ..ApiConfig::default()
        };
        assert!(over_postgres.validate().is_ok());
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = ApiConfig {
            rate_limit_window: Duration::ZERO,
            ..ApiConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_origin_allowed() {
        let mut config = ApiConfig::default();
        assert!(config.is_origin_allowed("https://anything.com"));
        assert!(!config.is_production());

        config.cors_origins = vec!["https://keystash.dev".to_string()];
        assert!(config.is_production());
        assert!(config.is_origin_allowed("https://keystash.dev"));
        assert!(!config.is_origin_allowed("https://evil.com"));
    }
}
