use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use tillsync_core::TenantScope;

use crate::error::StorageError;
use crate::traits::KvStore;

/// Namespace for values written before tenant scoping existed. No
/// `TenantScope` can produce it, so legacy data is reachable only through the
/// explicit fallback below.
pub const LEGACY_NAMESPACE: &str = "";

#[derive(Debug, Clone, Copy)]
pub struct ReadOptions<'a> {
    pub scope: &'a TenantScope,
    /// When set and the scoped key is absent, fall back to the un-scoped
    /// legacy key. One-way read-through: the first scoped write makes the
    /// legacy value dead for this (scope, key) pair.
    pub migrate_legacy: bool,
}

/// Typed, tenant-scoped layer over a raw [`KvStore`]. Reads never fail:
/// malformed bytes and backend errors both degrade to "absent", because a
/// corrupt cache entry must not block application logic.
pub struct ScopedStore<S: KvStore> {
    inner: S,
}

impl<S: KvStore> ScopedStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn read<T: DeserializeOwned>(&self, key: &str, default: T, options: ReadOptions) -> T {
        let namespace = options.scope.key();

        if let Some(value) = self.read_tier(namespace.as_str(), key) {
            return value;
        }

        if options.migrate_legacy {
            if let Some(value) = self.read_tier(LEGACY_NAMESPACE, key) {
                info!(key, scope = %namespace, "serving legacy un-scoped value; next write re-homes it");
                return value;
            }
        }

        default
    }

    pub fn write<T: Serialize>(
        &mut self,
        key: &str,
        value: &T,
        scope: &TenantScope,
    ) -> Result<(), StorageError> {
        let bytes = rmp_serde::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.inner.put_raw(scope.key().as_str(), key, &bytes)
    }

    fn read_tier<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Option<T> {
        let bytes = match self.inner.get_raw(namespace, key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(namespace, key, error = %e, "kv read failed; treating as absent");
                return None;
            }
        };
        match rmp_serde::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(namespace, key, error = %e, "stored value is malformed; treating as absent");
                None
            }
        }
    }
}
