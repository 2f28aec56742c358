//! Error Types for KEYSTASH API
//!
//! This module defines error handling for the API layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! Domain errors from keystash-core are mapped to wire codes here and
//! nowhere else.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use keystash_core::{KeystashError, StorageError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Authentication Errors (401)
    // ========================================================================
    /// Request lacks valid authentication credentials
    Unauthorized,

    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request validation failed
    ValidationFailed,

    /// Request contains invalid input data
    InvalidInput,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Key does not exist or has expired
    KeyNotFound,

    /// Requested tenant does not exist
    TenantNotFound,

    // ========================================================================
    // Conflict Errors (409)
    // ========================================================================
    /// Key already exists for this tenant
    KeyAlreadyExists,

    /// Tenant name is already registered
    TenantNameTaken,

    // ========================================================================
    // Capacity Errors (413, 429)
    // ========================================================================
    /// Tenant byte quota would be exceeded
    QuotaExceeded,

    /// Request rate limit exceeded
    TooManyRequests,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Database operation failed
    DatabaseError,

    /// Database connection pool exhausted
    ConnectionPoolExhausted,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,

            ErrorCode::ValidationFailed | ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,

            ErrorCode::KeyNotFound | ErrorCode::TenantNotFound => StatusCode::NOT_FOUND,

            ErrorCode::KeyAlreadyExists | ErrorCode::TenantNameTaken => StatusCode::CONFLICT,

            ErrorCode::QuotaExceeded => StatusCode::PAYLOAD_TOO_LARGE,

            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,

            ErrorCode::ConnectionPoolExhausted => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Authentication required",
            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::KeyNotFound => "Key not found in database",
            ErrorCode::TenantNotFound => "Tenant not found",
            ErrorCode::KeyAlreadyExists => "Key already exists in the database",
            ErrorCode::TenantNameTaken => "Tenant name already exists",
            ErrorCode::QuotaExceeded => "Tenant storage limit exceeded",
            ErrorCode::TooManyRequests => "Rate limit exceeded",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ConnectionPoolExhausted => "Connection pool exhausted",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn key_not_found() -> Self {
        Self::from_code(ErrorCode::KeyNotFound)
    }

    pub fn key_already_exists() -> Self {
        Self::from_code(ErrorCode::KeyAlreadyExists)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Create a TooManyRequests error.
    pub fn too_many_requests(retry_after_secs: Option<u64>) -> Self {
        let message = match retry_after_secs {
            Some(secs) => format!("Rate limit exceeded. Retry after {} seconds", secs),
            None => "Rate limit exceeded".to_string(),
        };
        Self::new(ErrorCode::TooManyRequests, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

/// Map a domain error to its wire code. Infrastructure details stay in logs.
impl From<KeystashError> for ApiError {
    fn from(err: KeystashError) -> Self {
        match err {
            KeystashError::Conflict { key, .. } => ApiError::key_already_exists()
                .with_details(serde_json::json!({ "key": key })),
            KeystashError::TenantNameTaken { name } => ApiError::new(
                ErrorCode::TenantNameTaken,
                format!("Tenant name '{}' already exists", name),
            ),
            KeystashError::NotFound { key, .. } => {
                ApiError::key_not_found().with_details(serde_json::json!({ "key": key }))
            }
            KeystashError::Expired { key, .. } => {
                ApiError::new(ErrorCode::KeyNotFound, "Key is expired")
                    .with_details(serde_json::json!({ "key": key }))
            }
            KeystashError::TenantNotFound { tenant_id } => ApiError::new(
                ErrorCode::TenantNotFound,
                format!("Tenant {} not found", tenant_id),
            ),
            KeystashError::QuotaExceeded {
                usage_bytes,
                requested_bytes,
                limit_bytes,
                ..
            } => ApiError::from_code(ErrorCode::QuotaExceeded).with_details(serde_json::json!({
                "usage_bytes": usage_bytes,
                "requested_bytes": requested_bytes,
                "limit_bytes": limit_bytes,
            })),
            KeystashError::Validation(v) => {
                let details = match &v {
                    ValidationError::BatchItemRejected { key, .. } => {
                        Some(serde_json::json!({ "key": key }))
                    }
                    _ => None,
                };
                let err = ApiError::validation_failed(v.to_string());
                match details {
                    Some(d) => err.with_details(d),
                    None => err,
                }
            }
            KeystashError::Storage(e @ StorageError::PoolExhausted { .. }) => {
                tracing::error!(error = %e, "Storage pool exhausted");
                ApiError::from_code(ErrorCode::ConnectionPoolExhausted)
            }
            KeystashError::Storage(e) => {
                tracing::error!(error = %e, "Storage failure");
                ApiError::database_error("Database operation failed")
            }
            KeystashError::Cache(e) => {
                tracing::error!(error = %e, "Cache failure");
                ApiError::internal_error("Cache operation failed")
            }
            KeystashError::Config(e) => {
                tracing::error!(error = %e, "Configuration failure");
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
