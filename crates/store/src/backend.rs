use async_trait::async_trait;

use crate::error::StoreError;

/// Raw object storage bound to a single bucket.
///
/// Implementations map every transport failure to [`StoreError::Unavailable`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create the bucket if it does not exist yet.
    async fn ensure_bucket(&self) -> Result<(), StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Fetch an object; `Ok(None)` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// Remove an object. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// All keys starting with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}
