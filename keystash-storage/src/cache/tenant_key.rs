//! Tenant-scoped cache keys.
//!
//! A `TenantScopedKey` can only be built from a tenant id and an object key,
//! so every cache lookup is tenant-isolated by construction.

use keystash_core::TenantId;
use uuid::Uuid;

/// Separator byte between tenant_id and the object key.
const SEPARATOR: u8 = 0xFF;

/// Length of the encoded tenant prefix.
pub const TENANT_PREFIX_LEN: usize = 17;

/// A cache key scoped to a single tenant.
///
/// # Binary Format
///
/// - Bytes 0-15: tenant_id (UUID bytes)
/// - Byte 16: separator (0xFF)
/// - Bytes 17..: object key (UTF-8)
///
/// 0xFF never appears in UTF-8, so the separator cannot be forged by a key
/// and all of one tenant's entries share a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantScopedKey {
    inner: TenantKeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TenantKeyInner {
    tenant_id: TenantId,
    key: String,
}

impl TenantScopedKey {
    pub fn new(tenant_id: TenantId, key: impl Into<String>) -> Self {
        Self {
            inner: TenantKeyInner {
                tenant_id,
                key: key.into(),
            },
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.inner.tenant_id
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Encode as `[tenant_id][0xFF][key]`.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(TENANT_PREFIX_LEN + self.inner.key.len());
        bytes.extend_from_slice(&Self::tenant_prefix(self.inner.tenant_id));
        bytes.extend_from_slice(self.inner.key.as_bytes());
        bytes
    }

    /// Decode a key from bytes.
    ///
    /// Returns `None` for a short buffer, a missing separator or a key that
    /// is not UTF-8.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < TENANT_PREFIX_LEN {
            return None;
        }
        if bytes[16] != SEPARATOR {
            return None;
        }
        let tenant_id = Uuid::from_slice(&bytes[0..16]).ok()?;
        let key = std::str::from_utf8(&bytes[TENANT_PREFIX_LEN..]).ok()?;
        Some(Self::new(tenant_id, key))
    }

    /// Prefix shared by every key of a tenant, for range scans.
    pub fn tenant_prefix(tenant_id: TenantId) -> [u8; TENANT_PREFIX_LEN] {
        let mut prefix = [0u8; TENANT_PREFIX_LEN];
        prefix[0..16].copy_from_slice(tenant_id.as_bytes());
        prefix[16] = SEPARATOR;
        prefix
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn uuid_strategy() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        /// Encoding then decoding returns the same key.
        #[test]
        fn prop_encode_decode_roundtrip(tenant_id in uuid_strategy(), key in ".{0,64}") {
            let scoped = TenantScopedKey::new(tenant_id, key);
            let decoded = TenantScopedKey::decode(&scoped.encode());
            prop_assert_eq!(Some(scoped), decoded);
        }

        /// Distinct keys never collide once encoded.
        #[test]
        fn prop_encoding_is_injective(
            tenant1 in uuid_strategy(),
            tenant2 in uuid_strategy(),
            key1 in "[a-z0-9:/_-]{1,32}",
            key2 in "[a-z0-9:/_-]{1,32}",
        ) {
            let a = TenantScopedKey::new(tenant1, key1);
            let b = TenantScopedKey::new(tenant2, key2);
            if a != b {
                prop_assert_ne!(a.encode(), b.encode());
            }
        }

        /// A tenant's prefix never matches another tenant's keys.
        #[test]
        fn prop_prefix_isolates_tenants(
            tenant1 in uuid_strategy(),
            tenant2 in uuid_strategy(),
            key in ".{0,32}",
        ) {
            prop_assume!(tenant1 != tenant2);
            let encoded = TenantScopedKey::new(tenant1, key).encode();
            let other_prefix = TenantScopedKey::tenant_prefix(tenant2);
            prop_assert!(!encoded.starts_with(&other_prefix));
        }
    }
}
