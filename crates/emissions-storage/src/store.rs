use crate::backend::{Result, StorageBackend};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Which backend to open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendType {
    Memory,
    #[cfg(feature = "rocksdb")]
    Rocksdb { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: BackendType,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Default to RocksDB for persistence if available
        #[cfg(feature = "rocksdb")]
        let backend = BackendType::Rocksdb {
            path: std::env::var("EMISSIONS_DATA_DIR")
                .unwrap_or_else(|_| "./data/emissions".to_string()),
        };

        #[cfg(not(feature = "rocksdb"))]
        let backend = BackendType::Memory;

        Self { backend }
    }
}

/// Opens the configured backend.
pub fn open_backend(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    match &config.backend {
        BackendType::Memory => {
            info!("Opening in-memory storage backend");
            Ok(Arc::new(crate::memory::MemoryBackend::new()))
        }
        #[cfg(feature = "rocksdb")]
        BackendType::Rocksdb { path } => {
            info!(path = %path, "Opening RocksDB storage backend");
            Ok(Arc::new(crate::rocks::RocksBackend::new(path)?))
        }
    }
}
