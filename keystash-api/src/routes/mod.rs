//! REST API Routes Module
//!
//! - Object CRUD and batch create under /api/objects (API key required)
//! - Tenant provisioning under /api/tenants
//! - Health check endpoints (Kubernetes-compatible)
//! - Prometheus metrics at /metrics
//! - CORS support for browser-based clients

pub mod health;
pub mod objects;
pub mod tenants;

use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::constants::API_KEY_HEADER;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{auth_middleware, rate_limit_middleware, AuthMiddlewareState, RateLimitState};
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use health::create_router as health_router;
pub use objects::create_router as objects_router;
pub use tenants::create_router as tenants_router;

// ============================================================================
// PRODUCTION VALIDATION
// ============================================================================

/// Check if running in a production environment.
fn is_production_environment() -> bool {
    std::env::var("KEYSTASH_ENVIRONMENT")
        .map(|e| matches!(e.to_lowercase().as_str(), "production" | "prod"))
        .unwrap_or(false)
}

/// Validate API configuration for production use.
fn validate_api_config_for_production(config: &ApiConfig) -> ApiResult<()> {
    if config.cors_origins.is_empty() {
        return Err(ApiError::invalid_input(
            "CORS origins not configured for production. Set KEYSTASH_CORS_ORIGINS.",
        ));
    }
    if !config.rate_limit_enabled {
        tracing::warn!(
            "Rate limiting is disabled in production. \
             Set KEYSTASH_RATE_LIMIT_ENABLED=true to enable it."
        );
    }
    Ok(())
}

// ============================================================================
// SECURE ROUTER BUILDER
// ============================================================================

/// Builder for the API router with auth and rate limiting on object routes.
///
/// Object routes are protected by:
/// 1. Authentication middleware (x-api-key)
/// 2. Per-tenant rate limiting
///
/// Tenant provisioning, health and metrics are public.
pub struct SecureRouterBuilder {
    state: AppState,
    auth_state: AuthMiddlewareState,
    rate_limit_state: RateLimitState,
}

impl SecureRouterBuilder {
    /// In production environments, missing security settings are an error.
    pub fn new(state: AppState) -> ApiResult<Self> {
        if is_production_environment() {
            validate_api_config_for_production(&state.config)?;
        }

        let auth_state = AuthMiddlewareState::new(state.registry.clone());
        let rate_limit_state =
            RateLimitState::new(state.config.rate_limit_enabled, state.config.rate_limit_window);

        Ok(Self {
            state,
            auth_state,
            rate_limit_state,
        })
    }

    /// Object routes with rate limiting (inner) and auth (outer).
    fn build_object_routes(&self) -> Router<AppState> {
        objects::create_router()
            .layer(from_fn_with_state(
                self.rate_limit_state.clone(),
                rate_limit_middleware,
            ))
            .layer(from_fn_with_state(self.auth_state.clone(), auth_middleware))
    }

    /// Build the complete router.
    ///
    /// # Middleware Order (outer to inner)
    /// 1. CORS (outermost) - handles preflight requests
    /// 2. Observability - tracing and metrics
    /// 3. Auth (object routes only) - resolves the tenant
    /// 4. Rate Limiting (object routes only) - spends the tenant's budget
    pub fn build(self) -> Router {
        let cors = build_cors_layer(&self.state.config);

        let api_routes = Router::new()
            .nest("/objects", self.build_object_routes())
            .nest("/tenants", tenants::create_router());

        Router::new()
            .nest("/api", api_routes)
            .nest("/health", health::create_router())
            .route("/metrics", get(metrics_handler))
            .with_state(self.state)
            .layer(from_fn(observability_middleware))
            .layer(cors)
    }
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(API_KEY_HEADER),
        ])
        .expose_headers([
            HeaderName::from_static("x-ratelimit-limit"),
            header::RETRY_AFTER,
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

/// Create the complete API router.
///
/// - Object routes under /api/objects/* (x-api-key required, rate limited)
/// - Tenant provisioning at /api/tenants
/// - Health checks at /health/* (public)
/// - Metrics at /metrics (public)
pub fn create_api_router(state: AppState) -> ApiResult<Router> {
    SecureRouterBuilder::new(state).map(SecureRouterBuilder::build)
}
