//! Ordered key-value storage for the emissions module.
//!
//! [`StorageBackend`] is the byte-level contract; [`Map`] and [`Item`] give
//! typed, prefix-scoped access on top of it.

pub mod backend;
pub mod collections;
pub mod key_codec;
pub mod key_prefix;
pub mod memory;
pub mod store;

#[cfg(feature = "rocksdb")]
pub mod rocks;

pub use backend::{Result, StorageBackend, StorageError, StorageStats};
pub use collections::{Item, Map};
pub use key_codec::KeyCodec;
pub use key_prefix::{hash_prefix, PREFIX_LEN};
pub use memory::MemoryBackend;
pub use store::{open_backend, BackendType, StorageConfig};

#[cfg(feature = "rocksdb")]
pub use rocks::RocksBackend;
