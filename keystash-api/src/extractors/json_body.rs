//! JSON body extractor with structured rejections.
//!
//! Axum's `Json` answers malformed bodies with plain text and a 415/422.
//! `ApiJson<T>` answers with an `ApiError` and 400 so clients see one error
//! shape across the API.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Extractor for a JSON request body.
///
/// # Example
///
/// ```rust,ignore
/// async fn create_object(
///     ApiJson(request): ApiJson<CreateObjectRequest>,
/// ) -> ApiResult<impl IntoResponse> {
///     // ...
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(rejection_to_error(rejection)),
        }
    }
}

fn rejection_to_error(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::invalid_input("Expected a JSON body with content-type application/json")
        }
        other => ApiError::invalid_input(format!("Invalid JSON body: {}", other.body_text())),
    }
}
