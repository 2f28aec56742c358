//! Middleware modules for KEYSTASH API
//!
//! - `auth`: API key authentication and per-tenant rate limiting
//!
//! # Middleware Order
//!
//! ```ignore
//! Router::new()
//!     .route("/api/objects", post(handler))
//!     // Innermost: needs the tenant resolved by auth
//!     .layer(middleware::from_fn_with_state(rate_limit_state, rate_limit_middleware))
//!     // Outermost
//!     .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
//! ```

mod auth;

pub use auth::{
    auth_middleware, rate_limit_middleware, AuthMiddlewareState, AuthTenant, RateLimitError,
    RateLimitState, TenantContext,
};
