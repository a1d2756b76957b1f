use crate::backend::{Result, StorageBackend, StorageError, StorageStats};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

type Tree = BTreeMap<Vec<u8>, Vec<u8>>;

#[derive(Default)]
struct Inner {
    data: Tree,
    snapshot: Option<Tree>,
}

/// In-memory ordered backend for testing and development
#[derive(Default)]
pub struct MemoryBackend {
    inner: RwLock<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let inner = self.inner.read().await;
        Ok(inner.data.get(key).cloned())
    }

    async fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.data.remove(key);
        Ok(())
    }

    async fn iterate_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let inner = self.inner.read().await;
        Ok(inner
            .data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn iterate_range(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let inner = self.inner.read().await;
        Ok(inner
            .data
            .range(start.to_vec()..)
            .take_while(|(k, _)| end.map_or(true, |end| k.as_slice() < end))
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn begin_transaction(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.snapshot.is_some() {
            return Err(StorageError::TransactionError(
                "transaction already active".to_string(),
            ));
        }
        inner.snapshot = Some(inner.data.clone());
        Ok(())
    }

    async fn commit_transaction(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.snapshot.take() {
            Some(_) => Ok(()),
            None => Err(StorageError::TransactionError(
                "no active transaction to commit".to_string(),
            )),
        }
    }

    async fn rollback_transaction(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.snapshot.take() {
            Some(snapshot) => {
                inner.data = snapshot;
                Ok(())
            }
            None => Err(StorageError::TransactionError(
                "no active transaction to roll back".to_string(),
            )),
        }
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn get_stats(&self) -> Result<StorageStats> {
        let inner = self.inner.read().await;
        let total: usize = inner.data.iter().map(|(k, v)| k.len() + v.len()).sum();
        Ok(StorageStats {
            key_count: inner.data.len(),
            total_size_bytes: Some(total as u64),
            in_transaction: inner.snapshot.is_some(),
        })
    }
}
