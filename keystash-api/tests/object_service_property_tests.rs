//! Property-Based Tests for the Object Service
//!
//! - Uniqueness: a second create of a live key is a conflict and leaves the
//!   first record untouched
//! - Batch partition: every input key lands in exactly one of `created` or
//!   `duplicates`, in input order
//! - Lazy expiry: a read after the ttl reports not-found and removes the
//!   record from the store
//! - Isolation: two tenants never see each other's keys

use keystash_api::types::CreateObjectRequest;
use keystash_core::{Clock, ErrorKind};
use keystash_test_utils::generators::{arb_distinct_keys, arb_key, arb_payload};
use proptest::prelude::*;
use tokio::runtime::Runtime;

#[path = "support/harness.rs"]
mod harness;
use harness::ServiceHarness;

const LARGE_QUOTA: u64 = 64 * 1024 * 1024;

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Creating a live key twice fails with a conflict; the stored data is
    /// the first payload.
    #[test]
    fn prop_create_is_unique_per_key(
        key in arb_key(),
        first in arb_payload(),
        second in arb_payload(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let h = ServiceHarness::new(LARGE_QUOTA).await;
            let tenant_id = h.tenant.tenant_id;

            h.service
                .create(tenant_id, CreateObjectRequest::new(key.clone(), first.clone()))
                .await?;
            let again = h
                .service
                .create(tenant_id, CreateObjectRequest::new(key.clone(), second))
                .await;
            prop_assert_eq!(again.map_err(|e| e.kind()).err(), Some(ErrorKind::Conflict));

            let data = h.service.get(tenant_id, &key).await?;
            prop_assert_eq!(data, first);
            Ok(())
        })?;
    }

    /// `created` and `duplicates` partition the batch, preserving order.
    #[test]
    fn prop_batch_partitions_input(
        keys in arb_distinct_keys(20),
        preexisting_mask in prop::collection::vec(any::<bool>(), 20),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let h = ServiceHarness::new(LARGE_QUOTA).await;
            let tenant_id = h.tenant.tenant_id;

            let mut expected_created = Vec::new();
            let mut expected_duplicates = Vec::new();
            for (key, preexisting) in keys.iter().zip(preexisting_mask.iter()) {
                if *preexisting {
                    h.service
                        .create(tenant_id, CreateObjectRequest::new(key.clone(), serde_json::json!(1)))
                        .await?;
                    expected_duplicates.push(key.clone());
                } else {
                    expected_created.push(key.clone());
                }
            }

            let items = keys
                .iter()
                .map(|k| CreateObjectRequest::new(k.clone(), serde_json::json!({"k": k})))
                .collect();
            let result = h.service.batch_create(tenant_id, items).await?;

            prop_assert_eq!(&result.created, &expected_created);
            prop_assert_eq!(&result.duplicates, &expected_duplicates);
            prop_assert_eq!(result.created.len() + result.duplicates.len(), keys.len());
            for key in &keys {
                prop_assert!(h.store.contains(tenant_id, key));
            }
            Ok(())
        })?;
    }

    /// After the ttl passes, a read is not-found and the record is gone,
    /// whether or not the read was served from cache before.
    #[test]
    fn prop_read_after_ttl_reclaims(
        key in arb_key(),
        data in arb_payload(),
        lifetime in 1i64..3_600,
        warm_cache in any::<bool>(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let h = ServiceHarness::new(LARGE_QUOTA).await;
            let tenant_id = h.tenant.tenant_id;
            let now = h.clock.unix_now();

            h.service
                .create(tenant_id, CreateObjectRequest::new(key.clone(), data).with_ttl(now + lifetime))
                .await?;
            if warm_cache {
                h.service.get(tenant_id, &key).await?;
            }

            // ttl == now is still live
            h.clock.advance_secs(lifetime);
            prop_assert!(h.service.get(tenant_id, &key).await.is_ok());

            h.clock.advance_secs(1);
            let expired = h.service.get(tenant_id, &key).await;
            prop_assert_eq!(expired.map_err(|e| e.kind()).err(), Some(ErrorKind::NotFound));
            prop_assert!(!h.store.contains(tenant_id, &key));
            Ok(())
        })?;
    }

    /// The same key under two tenants holds two independent values.
    #[test]
    fn prop_tenants_are_isolated(key in arb_key(), a in arb_payload(), b in arb_payload()) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let h = ServiceHarness::new(LARGE_QUOTA).await;
            let other = h.add_tenant(LARGE_QUOTA, "other-key").await;
            let tenant_a = h.tenant.tenant_id;
            let tenant_b = other.tenant_id;

            h.service.create(tenant_a, CreateObjectRequest::new(key.clone(), a.clone())).await?;
            let missing = h.service.get(tenant_b, &key).await;
            prop_assert_eq!(missing.map_err(|e| e.kind()).err(), Some(ErrorKind::NotFound));

            h.service.create(tenant_b, CreateObjectRequest::new(key.clone(), b.clone())).await?;
            prop_assert_eq!(h.service.get(tenant_a, &key).await?, a);
            prop_assert_eq!(h.service.get(tenant_b, &key).await?, b);

            h.service.delete(tenant_a, &key).await?;
            prop_assert!(h.service.get(tenant_b, &key).await.is_ok());
            Ok(())
        })?;
    }
}
