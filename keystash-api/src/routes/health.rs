//! Health Check Endpoints
//!
//! - /health - Store connectivity, version and uptime
//! - /health/ping - Simple liveness check
//! - /health/live - Process alive check
//! - /health/ready - Same check as /health, for orchestrators
//!
//! No authentication required for health endpoints.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use keystash_storage::ObjectStore;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDetails {
    pub store: ComponentHealth,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    /// `memory` or `postgres`
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping - Simple pong response
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/live - Process liveness check
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health and /health/ready - Store connectivity check
pub async fn readiness(
    State(store): State<Arc<dyn ObjectStore>>,
    State(start_time): State<Instant>,
) -> impl IntoResponse {
    let store_health = check_store(store.as_ref()).await;
    let overall_status = store_health.status;

    let response = HealthResponse {
        status: overall_status,
        message: None,
        details: Some(HealthDetails {
            store: store_health,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: start_time.elapsed().as_secs(),
        }),
    };

    let status_code = if overall_status == HealthStatus::Healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

async fn check_store(store: &dyn ObjectStore) -> ComponentHealth {
    let start = Instant::now();
    match store.health_check().await {
        Ok(()) => ComponentHealth {
            status: HealthStatus::Healthy,
            backend: store.backend_type().to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, backend = store.backend_type(), "Store health check failed");
            ComponentHealth {
                status: HealthStatus::Unhealthy,
                backend: store.backend_type().to_string(),
                latency_ms: None,
                error: Some(format!("Store check failed: {}", e)),
            }
        }
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create health check router (no auth required)
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(readiness))
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use keystash_core::{KeystashResult, Record, StorageError, TenantId, UnixSeconds};
    use tower::ServiceExt;

    /// Store whose health check always fails.
    struct DownStore;

    #[async_trait]
    impl ObjectStore for DownStore {
        async fn find_by_key(&self, _: TenantId, _: &str) -> KeystashResult<Option<Record>> {
            Ok(None)
        }
        async fn insert_if_absent(&self, record: &Record) -> KeystashResult<Record> {
            Ok(record.clone())
        }
        async fn delete_by_key(&self, _: TenantId, _: &str) -> KeystashResult<u64> {
            Ok(0)
        }
        async fn delete_if_expired(&self, _: TenantId, _: &str, _: UnixSeconds) -> KeystashResult<u64> {
            Ok(0)
        }
        async fn find_all(&self, _: TenantId) -> KeystashResult<Vec<Record>> {
            Ok(Vec::new())
        }
        async fn delete_expired(&self, _: UnixSeconds) -> KeystashResult<u64> {
            Ok(0)
        }
        async fn health_check(&self) -> KeystashResult<()> {
            Err(StorageError::PoolExhausted {
                reason: "no connections".to_string(),
            }
            .into())
        }
        fn backend_type(&self) -> &'static str {
            "down"
        }
    }

    fn get_request(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    #[tokio::test]
    async fn test_healthy_store_reports_ok() -> Result<(), String> {
        let app = create_router().with_state(AppState::default());
        let response = app
            .oneshot(get_request("/"))
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn test_unhealthy_store_reports_unavailable() -> Result<(), String> {
        let mut state = AppState::default();
        state.store = Arc::new(DownStore);
        let app = create_router().with_state(state);
        let response = app
            .oneshot(get_request("/ready"))
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        Ok(())
    }

    #[tokio::test]
    async fn test_ping() -> Result<(), String> {
        let app = create_router().with_state(AppState::default());
        let response = app
            .oneshot(get_request("/ping"))
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[test]
    fn test_health_response_serialization() -> Result<(), serde_json::Error> {
        let response = HealthResponse {
            status: HealthStatus::Healthy,
            message: Some("All systems operational".to_string()),
            details: None,
        };

        let json = serde_json::to_string(&response)?;
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(!json.contains("details"));
        Ok(())
    }

    #[test]
    fn test_component_health_with_error() -> Result<(), serde_json::Error> {
        let component = ComponentHealth {
            status: HealthStatus::Unhealthy,
            backend: "postgres".to_string(),
            latency_ms: None,
            error: Some("Connection refused".to_string()),
        };

        let json = serde_json::to_string(&component)?;
        assert!(json.contains("\"status\":\"unhealthy\""));
        assert!(json.contains("Connection refused"));
        Ok(())
    }
}
