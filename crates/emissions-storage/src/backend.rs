use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<bincode::Error> for StorageError {
    fn from(e: bincode::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Ordered byte-keyed store with single-level transactions.
///
/// Writes issued between `begin_transaction` and `commit_transaction` become
/// visible to readers immediately but are discarded by `rollback_transaction`.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Deleting an absent key is not an error.
    async fn delete(&self, key: &[u8]) -> Result<()>;

    async fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// All entries whose key starts with `prefix`, in ascending key order.
    async fn iterate_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// At most `limit` entries with `start <= key < end`, ascending. A missing
    /// `end` leaves the range open.
    async fn iterate_range(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    async fn begin_transaction(&self) -> Result<()>;

    async fn commit_transaction(&self) -> Result<()>;

    async fn rollback_transaction(&self) -> Result<()>;

    /// Flush any pending writes
    async fn flush(&self) -> Result<()>;

    async fn get_stats(&self) -> Result<StorageStats>;
}

#[derive(Debug, Clone, Default)]
pub struct StorageStats {
    pub key_count: usize,
    pub total_size_bytes: Option<u64>,
    pub in_transaction: bool,
}
