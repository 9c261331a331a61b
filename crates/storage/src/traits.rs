use crate::error::StorageError;

/// Raw byte-level persistence under a (namespace, key) pair. The scoped layer
/// sits on top of this; nothing above it touches namespaces directly.
pub trait KvStore {
    fn get_raw(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Full replace of the value under (namespace, key). Must be atomic within
    /// the process: a failed put leaves the prior value intact.
    fn put_raw(&mut self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError>;

    fn remove_raw(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;
}
