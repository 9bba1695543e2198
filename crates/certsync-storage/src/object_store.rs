use async_trait::async_trait;

use crate::errors::StorageError;

/// Minimal key-value object store used by the sync layer
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every key beginning with `prefix`, across all pages
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Object bytes, or `None` when the key does not exist
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StorageError>;
}
