//! Storage trait definitions.

use crate::StorageResult;

/// A string key-value persistence layer.
///
/// Implementations must be safe to share across tasks; every method is
/// synchronous.
pub trait KeyValueStore: Send + Sync {
    /// Store a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value. Returns whether something was removed.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// List every key currently stored.
    fn list_keys(&self) -> StorageResult<Vec<String>>;

    /// Remove every key. Returns how many were removed.
    fn clear(&self) -> StorageResult<usize> {
        let mut removed = 0;
        for key in self.list_keys()? {
            if self.delete(&key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
