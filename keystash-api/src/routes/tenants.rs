//! Tenant REST API Routes

use std::sync::Arc;

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router,
};

use crate::{
    error::ApiResult,
    extractors::ApiJson,
    services::TenantService,
    state::AppState,
    types::{CreateTenantRequest, CreateTenantResponse, TenantInfo},
};

/// POST /api/tenants - Provision a tenant and issue its API key
pub async fn create_tenant(
    State(tenants): State<Arc<TenantService>>,
    ApiJson(request): ApiJson<CreateTenantRequest>,
) -> ApiResult<impl IntoResponse> {
    let (tenant, api_key) = tenants.provision(request).await?;
    let response = CreateTenantResponse {
        tenant: TenantInfo::from(tenant),
        api_key,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// Create the tenant routes router.
pub fn create_router() -> Router<AppState> {
    Router::new().route("/", post(create_tenant))
}
