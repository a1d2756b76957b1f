use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use tokio::sync::RwLock;
use tracing::debug;

use crate::backend::{Result, StorageBackend, StorageError, StorageStats};

/// Pending writes of the open transaction; `None` marks a deletion.
type Overlay = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

pub struct RocksBackend {
    db: DB,
    overlay: RwLock<Option<Overlay>>,
}

fn backend_err(op: &str, e: rocksdb::Error) -> StorageError {
    StorageError::BackendError(format!("RocksDB {} error: {}", op, e))
}

impl RocksBackend {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_write_buffer_size(64 * 1024 * 1024);
        opts.set_max_background_jobs(4);
        opts.set_level_compaction_dynamic_level_bytes(true);

        Self::with_options(path, opts)
    }

    pub fn with_options<P: AsRef<Path>>(path: P, opts: Options) -> Result<Self> {
        let db = DB::open(&opts, path)
            .map_err(|e| StorageError::BackendError(format!("Failed to open RocksDB: {}", e)))?;

        Ok(Self {
            db,
            overlay: RwLock::new(None),
        })
    }

    fn scan_db(&self, prefix: &[u8]) -> Result<BTreeMap<Vec<u8>, Vec<u8>>> {
        let mut entries = BTreeMap::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward));

        for item in iter {
            let (key, value) = item.map_err(|e| backend_err("iterator", e))?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.insert(key.to_vec(), value.to_vec());
        }
        Ok(entries)
    }

    /// Up to `max` committed entries in `[start, end)`.
    fn scan_db_range(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        max: usize,
    ) -> Result<BTreeMap<Vec<u8>, Vec<u8>>> {
        let mut entries = BTreeMap::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(start, Direction::Forward));

        for item in iter {
            if entries.len() >= max {
                break;
            }
            let (key, value) = item.map_err(|e| backend_err("iterator", e))?;
            if end.is_some_and(|end| &key[..] >= end) {
                break;
            }
            entries.insert(key.to_vec(), value.to_vec());
        }
        Ok(entries)
    }
}

#[async_trait]
impl StorageBackend for RocksBackend {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(overlay) = self.overlay.read().await.as_ref() {
            if let Some(staged) = overlay.get(key) {
                return Ok(staged.clone());
            }
        }
        self.db.get(key).map_err(|e| backend_err("get", e))
    }

    async fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut guard = self.overlay.write().await;
        match guard.as_mut() {
            Some(overlay) => {
                overlay.insert(key.to_vec(), Some(value.to_vec()));
                Ok(())
            }
            None => self.db.put(key, value).map_err(|e| backend_err("put", e)),
        }
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        let mut guard = self.overlay.write().await;
        match guard.as_mut() {
            Some(overlay) => {
                overlay.insert(key.to_vec(), None);
                Ok(())
            }
            None => self.db.delete(key).map_err(|e| backend_err("delete", e)),
        }
    }

    async fn iterate_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged = self.scan_db(prefix)?;
        if let Some(overlay) = self.overlay.read().await.as_ref() {
            let staged = overlay
                .range(prefix.to_vec()..)
                .take_while(|(k, _)| k.starts_with(prefix));
            for (key, value) in staged {
                match value {
                    Some(v) => {
                        merged.insert(key.clone(), v.clone());
                    }
                    None => {
                        merged.remove(key);
                    }
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    async fn iterate_range(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let guard = self.overlay.read().await;
        let staged: Vec<(&Vec<u8>, &Option<Vec<u8>>)> = match guard.as_ref() {
            Some(overlay) => overlay
                .range(start.to_vec()..)
                .take_while(|(k, _)| end.map_or(true, |end| k.as_slice() < end))
                .collect(),
            None => Vec::new(),
        };

        // every staged deletion can hide at most one committed entry
        let deletions = staged.iter().filter(|(_, v)| v.is_none()).count();
        let mut merged = self.scan_db_range(start, end, limit.saturating_add(deletions))?;
        for (key, value) in staged {
            match value {
                Some(v) => {
                    merged.insert(key.clone(), v.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().take(limit).collect())
    }

    async fn begin_transaction(&self) -> Result<()> {
        let mut guard = self.overlay.write().await;
        if guard.is_some() {
            return Err(StorageError::TransactionError(
                "transaction already active".to_string(),
            ));
        }
        *guard = Some(Overlay::new());
        Ok(())
    }

    async fn commit_transaction(&self) -> Result<()> {
        let mut guard = self.overlay.write().await;
        let overlay = guard.take().ok_or_else(|| {
            StorageError::TransactionError("no active transaction to commit".to_string())
        })?;

        let mut batch = WriteBatch::default();
        for (key, value) in &overlay {
            match value {
                Some(v) => batch.put(key, v),
                None => batch.delete(key),
            }
        }
        debug!(writes = overlay.len(), "Committing RocksDB write batch");
        self.db.write(batch).map_err(|e| backend_err("batch write", e))
    }

    async fn rollback_transaction(&self) -> Result<()> {
        let mut guard = self.overlay.write().await;
        match guard.take() {
            Some(overlay) => {
                debug!(discarded = overlay.len(), "Rolled back RocksDB transaction");
                Ok(())
            }
            None => Err(StorageError::TransactionError(
                "no active transaction to roll back".to_string(),
            )),
        }
    }

    async fn flush(&self) -> Result<()> {
        self.db.flush().map_err(|e| backend_err("flush", e))
    }

    async fn get_stats(&self) -> Result<StorageStats> {
        let entries = self.iterate_prefix(&[]).await?;
        let total: usize = entries.iter().map(|(k, v)| k.len() + v.len()).sum();
        Ok(StorageStats {
            key_count: entries.len(),
            total_size_bytes: Some(total as u64),
            in_transaction: self.overlay.read().await.is_some(),
        })
    }
}
