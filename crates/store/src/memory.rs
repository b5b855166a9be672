//! Process-local object store.
//!
//! Used when `ARTIFACT_STORE=memory` for local runs and as the test double for
//! everything that sits on top of [`ObjectStore`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::backend::ObjectStore;
use crate::error::StoreError;

pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    bucket_ready: AtomicBool,
    available: AtomicBool,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            bucket_ready: AtomicBool::new(false),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: while unavailable every call fails with
    /// [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn bucket_ready(&self) -> bool {
        self.bucket_ready.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store offline".into()))
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn ensure_bucket(&self) -> Result<(), StoreError> {
        self.check()?;
        self.bucket_ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.check()?;
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check()?;
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.check()?;
        self.objects.write().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check()?;
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.check()?;
        Ok(self
            .objects
            .read()
            .await
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn list_is_prefix_scoped() {
        let store = MemoryObjectStore::new();
        store.put("a/1", vec![1]).await.unwrap();
        store.put("a/2", vec![2]).await.unwrap();
        store.put("ab/3", vec![3]).await.unwrap();
        store.put("b/4", vec![4]).await.unwrap();

        assert_eq!(store.list("a/").await.unwrap(), vec!["a/1", "a/2"]);
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = MemoryObjectStore::new();
        store.set_available(false);
        assert_matches!(store.exists("k").await, Err(StoreError::Unavailable(_)));
        store.set_available(true);
        assert!(!store.exists("k").await.unwrap());
    }
}
