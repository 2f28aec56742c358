//! End-to-end tests for the HTTP surface over in-memory backends.

use axum::http::StatusCode;
use axum::Router;
use keystash_api::ApiConfig;
use keystash_test_utils::TEST_NOW;
use serde_json::{json, Value};
use tower::ServiceExt;

#[path = "support/harness.rs"]
mod harness;
use harness::{body_json, empty_request, json_request, test_app};

async fn send(app: &Router, request: axum::http::Request<axum::body::Body>) -> Result<(StatusCode, Value), String> {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .map_err(|e| format!("Request failed: {:?}", e))?;
    let status = response.status();
    let body = body_json(response).await.unwrap_or(Value::Null);
    Ok((status, body))
}

/// Provision a tenant over HTTP and return its API key.
async fn provision(app: &Router, name: &str, limit_mb: u64, rate_limit: u32) -> Result<String, String> {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/api/tenants",
            None,
            json!({ "name": name, "tenant_limit_mb": limit_mb, "rate_limit": rate_limit }),
        ),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "provisioning failed: {}", body);
    body["api_key"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| "response has no api_key".to_string())
}

#[tokio::test]
async fn test_object_lifecycle() -> Result<(), String> {
    let (app, _clock) = test_app(ApiConfig::default());
    let key = provision(&app, "acme", 1, 1000).await?;

    let (status, body) = send(
        &app,
        json_request("POST", "/api/objects", Some(&key), json!({ "key": "user:1", "data": { "n": 1 } })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["key"], "user:1");
    assert_eq!(body["size_bytes"], 7);

    let (status, body) = send(&app, empty_request("GET", "/api/objects/user:1", Some(&key))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "key": "user:1", "data": { "n": 1 } }));

    let (status, body) = send(&app, empty_request("DELETE", "/api/objects/user:1", Some(&key))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Key deleted successfully");

    let (status, body) = send(&app, empty_request("GET", "/api/objects/user:1", Some(&key))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "KEY_NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn test_duplicate_create_is_conflict() -> Result<(), String> {
    let (app, _clock) = test_app(ApiConfig::default());
    let key = provision(&app, "acme", 1, 1000).await?;
    let body = json!({ "key": "k", "data": "v" });

    let (status, _) = send(&app, json_request("POST", "/api/objects", Some(&key), body.clone())).await?;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(&app, json_request("POST", "/api/objects", Some(&key), body)).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "KEY_ALREADY_EXISTS");
    Ok(())
}

#[tokio::test]
async fn test_delete_missing_is_not_found() -> Result<(), String> {
    let (app, _clock) = test_app(ApiConfig::default());
    let key = provision(&app, "acme", 1, 1000).await?;
    let (status, _) = send(&app, empty_request("DELETE", "/api/objects/ghost", Some(&key))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_missing_and_unknown_keys_are_unauthorized() -> Result<(), String> {
    let (app, _clock) = test_app(ApiConfig::default());

    let (status, body) = send(&app, empty_request("GET", "/api/objects/k", None)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "API key is missing");

    let (status, body) = send(&app, empty_request("GET", "/api/objects/k", Some("nope"))).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid API key");
    Ok(())
}

#[tokio::test]
async fn test_quota_exceeded_is_413() -> Result<(), String> {
    let (app, _clock) = test_app(ApiConfig::default());
    let key = provision(&app, "small", 1, 1000).await?;
    let big = "x".repeat(1024 * 1024 + 1);

    let (status, body) = send(
        &app,
        json_request("POST", "/api/objects", Some(&key), json!({ "key": "big", "data": big })),
    )
    .await?;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["code"], "QUOTA_EXCEEDED");

    let (status, _) = send(&app, empty_request("GET", "/api/objects/big", Some(&key))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_expired_key_reads_as_not_found() -> Result<(), String> {
    let (app, clock) = test_app(ApiConfig::default());
    let key = provision(&app, "acme", 1, 1000).await?;

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/objects",
            Some(&key),
            json!({ "key": "session", "data": "s", "ttl": TEST_NOW + 10 }),
        ),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, empty_request("GET", "/api/objects/session", Some(&key))).await?;
    assert_eq!(status, StatusCode::OK);

    clock.advance_secs(11);
    let (status, body) = send(&app, empty_request("GET", "/api/objects/session", Some(&key))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Key is expired");

    // The key is free again
    let (status, _) = send(
        &app,
        json_request("POST", "/api/objects", Some(&key), json!({ "key": "session", "data": "t" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn test_past_ttl_is_bad_request() -> Result<(), String> {
    let (app, _clock) = test_app(ApiConfig::default());
    let key = provision(&app, "acme", 1, 1000).await?;
    let (status, body) = send(
        &app,
        json_request("POST", "/api/objects", Some(&key), json!({ "key": "k", "data": 1, "ttl": TEST_NOW })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
    Ok(())
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() -> Result<(), String> {
    let (app, _clock) = test_app(ApiConfig::default());
    let key = provision(&app, "acme", 1, 1000).await?;
    let (status, body) = send(
        &app,
        json_request("POST", "/api/objects", Some(&key), json!({ "data": 1 })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
    Ok(())
}

#[tokio::test]
async fn test_batch_reports_duplicates() -> Result<(), String> {
    let (app, _clock) = test_app(ApiConfig::default());
    let key = provision(&app, "acme", 1, 1000).await?;

    send(&app, json_request("POST", "/api/objects", Some(&key), json!({ "key": "b", "data": 0 }))).await?;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/objects/batch",
            Some(&key),
            json!({ "items": [
                { "key": "a", "data": 1 },
                { "key": "b", "data": 2 },
                { "key": "c", "data": 3 },
            ] }),
        ),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["created"], json!(["a", "c"]));
    assert_eq!(body["duplicates"], json!(["b"]));
    assert_eq!(
        body["message"],
        "Some keys were not created because they already exist in the database"
    );
    Ok(())
}

#[tokio::test]
async fn test_batch_over_limit_is_bad_request() -> Result<(), String> {
    let (app, _clock) = test_app(ApiConfig::default());
    let key = provision(&app, "acme", 1, 1000).await?;
    let items: Vec<Value> = (0..51).map(|i| json!({ "key": format!("k{}", i), "data": i })).collect();

    let (status, _) = send(
        &app,
        json_request("POST", "/api/objects/batch", Some(&key), json!({ "items": items })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, empty_request("GET", "/api/objects/k0", Some(&key))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_rate_limit_returns_429_with_retry_after() -> Result<(), String> {
    let (app, _clock) = test_app(ApiConfig::default());
    let key = provision(&app, "chatty", 1, 2).await?;

    for _ in 0..2 {
        let (status, _) = send(&app, empty_request("GET", "/api/objects/k", Some(&key))).await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/api/objects/k", Some(&key)))
        .await
        .map_err(|e| format!("Request failed: {:?}", e))?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
    Ok(())
}

#[tokio::test]
async fn test_tenant_budgets_are_independent() -> Result<(), String> {
    let (app, _clock) = test_app(ApiConfig::default());
    let first = provision(&app, "first", 1, 1).await?;
    let second = provision(&app, "second", 1, 1).await?;

    let (status, _) = send(&app, empty_request("GET", "/api/objects/k", Some(&first))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, empty_request("GET", "/api/objects/k", Some(&first))).await?;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _) = send(&app, empty_request("GET", "/api/objects/k", Some(&second))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_tenant_name_is_conflict() -> Result<(), String> {
    let (app, _clock) = test_app(ApiConfig::default());
    provision(&app, "acme", 1, 10).await?;
    let (status, body) = send(
        &app,
        json_request("POST", "/api/tenants", None, json!({ "name": "acme" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "TENANT_NAME_TAKEN");
    Ok(())
}

#[tokio::test]
async fn test_health_and_metrics_are_public() -> Result<(), String> {
    let (app, _clock) = test_app(ApiConfig::default());

    let (status, body) = send(&app, empty_request("GET", "/health", None)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/metrics", None))
        .await
        .map_err(|e| format!("Request failed: {:?}", e))?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}
