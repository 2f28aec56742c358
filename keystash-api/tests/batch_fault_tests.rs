//! Batch create when the store rejects an item part way through.

use std::sync::Arc;

use keystash_api::types::CreateObjectRequest;
use keystash_core::{ErrorKind, KeystashError, ValidationError};
use keystash_test_utils::{FaultyObjectStore, StorageError};

#[path = "support/harness.rs"]
mod harness;
use harness::service_over;

fn items(keys: &[&str]) -> Vec<CreateObjectRequest> {
    keys.iter()
        .map(|k| CreateObjectRequest::new(*k, serde_json::json!({ "k": k })))
        .collect()
}

#[tokio::test]
async fn test_constraint_violation_aborts_batch_naming_key() -> Result<(), String> {
    let store = Arc::new(FaultyObjectStore::new());
    store.fail_insert(
        "b",
        StorageError::ConstraintViolation {
            constraint: "kv_store_key_check".to_string(),
            reason: "value violates check constraint".to_string(),
        },
    );
    let (service, tenant, _clock) = service_over(store.clone(), 1024 * 1024).await;

    let result = service
        .batch_create(tenant.tenant_id, items(&["a", "b", "c"]))
        .await;

    match result {
        Err(KeystashError::Validation(ValidationError::BatchItemRejected { key, .. })) => {
            assert_eq!(key, "b");
        }
        other => return Err(format!("Expected BatchItemRejected, got {:?}", other)),
    }

    // Items before the failure stay; items after it were never attempted
    assert!(store.inner().contains(tenant.tenant_id, "a"));
    assert!(!store.inner().contains(tenant.tenant_id, "b"));
    assert!(!store.inner().contains(tenant.tenant_id, "c"));
    Ok(())
}

#[tokio::test]
async fn test_store_failure_propagates_as_internal() -> Result<(), String> {
    let store = Arc::new(FaultyObjectStore::new());
    store.fail_insert(
        "b",
        StorageError::QueryFailed {
            reason: "connection reset".to_string(),
        },
    );
    let (service, tenant, _clock) = service_over(store.clone(), 1024 * 1024).await;

    let result = service
        .batch_create(tenant.tenant_id, items(&["a", "b", "c"]))
        .await;
    assert_eq!(result.map_err(|e| e.kind()).err(), Some(ErrorKind::Internal));
    assert!(store.inner().contains(tenant.tenant_id, "a"));
    assert!(!store.inner().contains(tenant.tenant_id, "c"));
    Ok(())
}

#[tokio::test]
async fn test_usage_failure_blocks_create() -> Result<(), String> {
    let store = Arc::new(FaultyObjectStore::new());
    store.fail_usage(StorageError::PoolExhausted {
        reason: "no connections".to_string(),
    });
    let (service, tenant, _clock) = service_over(store.clone(), 1024 * 1024).await;

    let result = service
        .create(tenant.tenant_id, CreateObjectRequest::new("a", serde_json::json!(1)))
        .await;
    assert_eq!(result.map_err(|e| e.kind()).err(), Some(ErrorKind::Internal));
    assert_eq!(store.inner().record_count(), 0);
    Ok(())
}
