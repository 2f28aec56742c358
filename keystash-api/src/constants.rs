//! Constants for KEYSTASH API
//!
//! This module contains all constant values used throughout the API.
//! Centralizing constants makes them easy to find, modify, and test.

// ============================================================================
// SERVER
// ============================================================================

/// Default bind address
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 3000;

// ============================================================================
// AUTHENTICATION
// ============================================================================

/// Header carrying the tenant's API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Random bytes in a freshly issued API key (hex encoded on the wire)
pub const API_KEY_BYTES: usize = 32;

// ============================================================================
// CORS
// ============================================================================

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// RATE LIMITING
// ============================================================================

/// Default rate limit window in seconds. A tenant's `rate_limit` applies per window.
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

// ============================================================================
// CACHE
// ============================================================================

/// Default LMDB cache directory
pub const DEFAULT_CACHE_PATH: &str = "./data/cache";

/// Default LMDB map size in megabytes
pub const DEFAULT_CACHE_MAP_SIZE_MB: usize = 256;

// ============================================================================
// DATABASE
// ============================================================================

pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_DB_NAME: &str = "keystash";
pub const DEFAULT_DB_USER: &str = "postgres";
pub const DEFAULT_DB_POOL_SIZE: usize = 16;
pub const DEFAULT_DB_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// EXPIRY SWEEP
// ============================================================================

/// Default interval between expiry sweeps (30 minutes)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 1800;

/// Default interval between cache purges (5 minutes)
pub const DEFAULT_CACHE_PURGE_INTERVAL_SECS: u64 = 300;

// ============================================================================
// TELEMETRY
// ============================================================================

/// Default tracing filter when RUST_LOG is unset
pub const DEFAULT_LOG_FILTER: &str = "keystash_api=info,tower_http=info";

/// Service name attached to log output
pub const SERVICE_NAME: &str = "keystash-api";

// ============================================================================
// TESTS
// ============================================================================
