//! Object REST API Routes
//!
//! Handlers are thin: they take the authenticated tenant from the request,
//! call the `ObjectService`, and shape the response. Every domain error is
//! mapped to its status code in `crate::error`.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::{
    error::ApiResult,
    extractors::ApiJson,
    middleware::AuthTenant,
    services::ObjectService,
    state::AppState,
    types::{
        BatchCreateRequest, CreateObjectRequest, MessageResponse, ObjectResponse,
        ObjectValueResponse,
    },
};

pub const KEY_DELETED_MESSAGE: &str = "Key deleted successfully";

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/objects - Create an object
pub async fn create_object(
    State(objects): State<Arc<ObjectService>>,
    AuthTenant(tenant): AuthTenant,
    ApiJson(request): ApiJson<CreateObjectRequest>,
) -> ApiResult<impl IntoResponse> {
    let record = objects.create(tenant.tenant_id, request).await?;
    Ok((StatusCode::CREATED, Json(ObjectResponse::from(record))))
}

/// GET /api/objects/:key - Read an object's data
pub async fn get_object(
    State(objects): State<Arc<ObjectService>>,
    AuthTenant(tenant): AuthTenant,
    Path(key): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let data = objects.get(tenant.tenant_id, &key).await?;
    Ok(Json(ObjectValueResponse { key, data }))
}

/// DELETE /api/objects/:key - Delete an object
pub async fn delete_object(
    State(objects): State<Arc<ObjectService>>,
    AuthTenant(tenant): AuthTenant,
    Path(key): Path<String>,
) -> ApiResult<impl IntoResponse> {
    objects.delete(tenant.tenant_id, &key).await?;
    Ok(Json(MessageResponse::new(KEY_DELETED_MESSAGE)))
}

/// POST /api/objects/batch - Create several objects
pub async fn batch_create_objects(
    State(objects): State<Arc<ObjectService>>,
    AuthTenant(tenant): AuthTenant,
    ApiJson(request): ApiJson<BatchCreateRequest>,
) -> ApiResult<impl IntoResponse> {
    let response = objects.batch_create(tenant.tenant_id, request.items).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the object routes router. Requires auth middleware around it.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_object))
        .route("/batch", post(batch_create_objects))
        .route("/:key", get(get_object).delete(delete_object))
}
