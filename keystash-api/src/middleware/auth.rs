//! Axum Middleware for Authentication and Rate Limiting
//!
//! - `auth_middleware` resolves the `x-api-key` header to a tenant and
//!   injects it into request extensions, or answers 401
//! - `rate_limit_middleware` enforces each tenant's own request budget and
//!   answers 429 with `retry-after` when it is spent
//!
//! Auth must run before rate limiting; the limiter is keyed by tenant.

use crate::constants::API_KEY_HEADER;
use crate::error::{ApiError, ApiResult};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use governor::{clock::DefaultClock, Quota, RateLimiter};
use keystash_core::{Tenant, TenantId};
use keystash_storage::TenantRegistry;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// AUTHENTICATION
// ============================================================================

/// Shared state for authentication middleware.
#[derive(Clone)]
pub struct AuthMiddlewareState {
    pub registry: Arc<dyn TenantRegistry>,
}

impl AuthMiddlewareState {
    pub fn new(registry: Arc<dyn TenantRegistry>) -> Self {
        Self { registry }
    }
}

/// The authenticated tenant for this request.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant: Tenant,
}

impl TenantContext {
    pub fn tenant_id(&self) -> TenantId {
        self.tenant.tenant_id
    }
}

/// Resolve the presented API key to a tenant.
///
/// Returns 401 if the header is absent or matches no tenant.
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let api_key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::unauthorized("API key is missing"))?;

    let tenant = state
        .registry
        .resolve_tenant(api_key)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid API key"))?;

    request.extensions_mut().insert(TenantContext { tenant });

    Ok(next.run(request).await)
}

// ============================================================================
// TYPED EXTRACTOR
// ============================================================================

/// Typed extractor for the authenticated tenant.
///
/// Requires `auth_middleware` on the route; without it extraction fails
/// with a 500.
#[derive(Debug, Clone)]
pub struct AuthTenant(pub Tenant);

#[async_trait]
impl<S> FromRequestParts<S> for AuthTenant
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .map(|ctx| AuthTenant(ctx.tenant.clone()))
            .ok_or_else(|| {
                ApiError::internal_error(
                    "Tenant context not found in request extensions. \
                     Ensure auth_middleware is applied to this route.",
                )
            })
    }
}

impl std::ops::Deref for AuthTenant {
    type Target = Tenant;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ============================================================================
// RATE LIMITING
// ============================================================================

type DirectRateLimiter =
    RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, DefaultClock>;

/// A tenant's limiter together with the budget it was built for.
struct TenantLimiter {
    rate_limit: u32,
    limiter: Arc<DirectRateLimiter>,
}

/// State for rate limiting middleware.
#[derive(Clone)]
pub struct RateLimitState {
    enabled: bool,
    window: Duration,
    limiters: Arc<DashMap<TenantId, TenantLimiter>>,
}

/// `rate_limit` requests per `window`, all of them available as a burst.
fn tenant_quota(rate_limit: u32, window: Duration) -> Quota {
    let burst = NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(window / burst.get())
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}

impl RateLimitState {
    pub fn new(enabled: bool, window: Duration) -> Self {
        Self {
            enabled,
            window,
            limiters: Arc::new(DashMap::new()),
        }
    }

    /// Limiter for this tenant, rebuilt if its budget changed.
    fn limiter_for(&self, tenant: &Tenant) -> Arc<DirectRateLimiter> {
        let mut entry = self
            .limiters
            .entry(tenant.tenant_id)
            .or_insert_with(|| TenantLimiter {
                rate_limit: tenant.rate_limit,
                limiter: Arc::new(RateLimiter::direct(tenant_quota(tenant.rate_limit, self.window))),
            });
        if entry.rate_limit != tenant.rate_limit {
            *entry = TenantLimiter {
                rate_limit: tenant.rate_limit,
                limiter: Arc::new(RateLimiter::direct(tenant_quota(tenant.rate_limit, self.window))),
            };
        }
        entry.limiter.clone()
    }

    /// Consume one request from the tenant's budget.
    pub fn check(&self, tenant: &Tenant) -> Result<(), RateLimitError> {
        if !self.enabled {
            return Ok(());
        }
        self.limiter_for(tenant).check().map_err(|not_until| {
            let retry_after = not_until
                .wait_time_from(governor::clock::Clock::now(&DefaultClock::default()))
                .as_secs()
                .max(1);
            RateLimitError { retry_after }
        })
    }
}

/// Error type for rate limit middleware.
#[derive(Debug)]
pub struct RateLimitError {
    /// Seconds until the tenant may retry
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let error = ApiError::too_many_requests(Some(self.retry_after));
        let mut response = (StatusCode::TOO_MANY_REQUESTS, axum::Json(error)).into_response();
        response.headers_mut().insert(
            axum::http::header::RETRY_AFTER,
            HeaderValue::from_str(&self.retry_after.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("60")),
        );
        response
    }
}

/// Per-tenant rate limiting middleware.
///
/// Requests without a tenant context pass through untouched.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    let tenant = match request.extensions().get::<TenantContext>() {
        Some(ctx) => ctx.tenant.clone(),
        None => return Ok(next.run(request).await),
    };
    let rate_limit = tenant.rate_limit;

    if let Err(e) = state.check(&tenant) {
        tracing::debug!(tenant_id = %tenant.tenant_id, retry_after = e.retry_after, "Rate limited");
        return Err(e);
    }

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&rate_limit.to_string()) {
        response.headers_mut().insert(
            axum::http::header::HeaderName::from_static("x-ratelimit-limit"),
            value,
        );
    }
    Ok(response)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use chrono::Utc;
    use keystash_core::credential_digest;
    use keystash_storage::InMemoryTenantRegistry;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn tenant(rate_limit: u32) -> Tenant {
        Tenant::new(Uuid::now_v7(), "acme", 1024, rate_limit, Utc::now())
    }

    async fn test_app(rate_limit: u32) -> Router {
        let registry = Arc::new(InMemoryTenantRegistry::new());
        registry
            .insert_tenant(&tenant(rate_limit), &credential_digest("good-key"))
            .await
            .expect("tenant");

        Router::new()
            .route(
                "/protected",
                get(|AuthTenant(t): AuthTenant| async move { t.name }),
            )
            .layer(middleware::from_fn_with_state(
                RateLimitState::new(true, Duration::from_secs(60)),
                rate_limit_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                AuthMiddlewareState::new(registry),
                auth_middleware,
            ))
    }

    fn request(key: Option<&str>) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::builder().uri("/protected");
        if let Some(k) = key {
            builder = builder.header(API_KEY_HEADER, k);
        }
        builder.body(Body::empty()).expect("request")
    }

    #[tokio::test]
    async fn test_valid_key_passes() -> Result<(), String> {
        let app = test_app(10).await;
        let response = app
            .oneshot(request(Some("good-key")))
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-ratelimit-limit").and_then(|v| v.to_str().ok()),
            Some("10")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_key_is_unauthorized() -> Result<(), String> {
        let app = test_app(10).await;
        let response = app
            .oneshot(request(None))
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_key_is_unauthorized() -> Result<(), String> {
        let app = test_app(10).await;
        let response = app
            .oneshot(request(Some("bad-key")))
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_budget_exhaustion_returns_429() -> Result<(), String> {
        let app = test_app(2).await;
        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(request(Some("good-key")))
                .await
                .map_err(|e| format!("Request failed: {:?}", e))?;
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = app
            .oneshot(request(Some("good-key")))
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(axum::http::header::RETRY_AFTER));
        Ok(())
    }

    #[test]
    fn test_tenants_have_separate_budgets() {
        let state = RateLimitState::new(true, Duration::from_secs(60));
        let a = tenant(1);
        let b = tenant(1);
        assert!(state.check(&a).is_ok());
        assert!(state.check(&a).is_err());
        assert!(state.check(&b).is_ok());
    }

    #[test]
    fn test_disabled_limiter_never_rejects() {
        let state = RateLimitState::new(false, Duration::from_secs(60));
        let t = tenant(1);
        for _ in 0..5 {
            assert!(state.check(&t).is_ok());
        }
    }

    #[test]
    fn test_budget_change_rebuilds_limiter() {
        let state = RateLimitState::new(true, Duration::from_secs(60));
        let mut t = tenant(1);
        assert!(state.check(&t).is_ok());
        assert!(state.check(&t).is_err());
        t.rate_limit = 5;
        assert!(state.check(&t).is_ok());
    }
}
