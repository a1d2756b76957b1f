//! Typed views over a [`StorageBackend`].
//!
//! A [`Map`] owns every key that starts with its prefix. Keys are encoded
//! with [`KeyCodec`] and values with bincode.

use crate::backend::{Result, StorageBackend, StorageError};
use crate::key_codec::{self, KeyCodec};
use crate::key_prefix::PREFIX_LEN;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

pub struct Map<K, V> {
    backend: Arc<dyn StorageBackend>,
    prefix: [u8; PREFIX_LEN],
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Clone for Map<K, V> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            prefix: self.prefix,
            _marker: PhantomData,
        }
    }
}

impl<K, V> Map<K, V>
where
    K: KeyCodec,
    V: Serialize + DeserializeOwned,
{
    pub fn new(backend: Arc<dyn StorageBackend>, prefix: [u8; PREFIX_LEN]) -> Self {
        Self {
            backend,
            prefix,
            _marker: PhantomData,
        }
    }

    pub fn prefix(&self) -> &[u8; PREFIX_LEN] {
        &self.prefix
    }

    fn full_key<P: KeyCodec>(&self, key: &P) -> Result<Vec<u8>> {
        let mut out = self.prefix.to_vec();
        key.encode_key(&mut out)?;
        Ok(out)
    }

    pub async fn get(&self, key: &K) -> Result<Option<V>> {
        let full = self.full_key(key)?;
        match self.backend.get(&full).await? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn get_or_default(&self, key: &K) -> Result<V>
    where
        V: Default,
    {
        Ok(self.get(key).await?.unwrap_or_default())
    }

    pub async fn has(&self, key: &K) -> Result<bool> {
        let full = self.full_key(key)?;
        self.backend.has(&full).await
    }

    pub async fn set(&self, key: &K, value: &V) -> Result<()> {
        let full = self.full_key(key)?;
        let bytes = bincode::serialize(value)?;
        self.backend.set(&full, &bytes).await
    }

    pub async fn remove(&self, key: &K) -> Result<()> {
        let full = self.full_key(key)?;
        self.backend.delete(&full).await
    }

    /// Every entry, ascending by key.
    pub async fn iterate(&self) -> Result<Vec<(K, V)>> {
        self.scan(self.prefix.to_vec()).await
    }

    /// Entries whose key begins with the leading components `partial`.
    pub async fn iterate_prefix<P: KeyCodec>(&self, partial: &P) -> Result<Vec<(K, V)>> {
        let full = self.full_key(partial)?;
        self.scan(full).await
    }

    /// Up to `limit` entries, ascending, whose key sorts at or before the
    /// leading components `upper`. Keys that extend `upper` are included.
    pub async fn iterate_through<P: KeyCodec>(&self, upper: &P, limit: usize) -> Result<Vec<(K, V)>> {
        let end = next_key(&self.full_key(upper)?).or_else(|| next_key(&self.prefix));
        let raw = self
            .backend
            .iterate_range(&self.prefix, end.as_deref(), limit)
            .await?;
        raw.into_iter()
            .take_while(|(key, _)| key.starts_with(&self.prefix))
            .map(|(key, bytes)| self.decode_entry(&key, &bytes))
            .collect()
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.backend.iterate_prefix(&self.prefix).await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    async fn scan(&self, scan_prefix: Vec<u8>) -> Result<Vec<(K, V)>> {
        let raw = self.backend.iterate_prefix(&scan_prefix).await?;
        raw.into_iter()
            .map(|(key, bytes)| self.decode_entry(&key, &bytes))
            .collect()
    }

    fn decode_entry(&self, key: &[u8], bytes: &[u8]) -> Result<(K, V)> {
        let stripped = key.get(PREFIX_LEN..).ok_or_else(|| {
            StorageError::InvalidKey("key shorter than collection prefix".to_string())
        })?;
        let decoded = key_codec::decode::<K>(stripped)?;
        let value = bincode::deserialize(bytes)?;
        Ok((decoded, value))
    }
}

/// Smallest key greater than every key starting with `key`, if one exists.
fn next_key(key: &[u8]) -> Option<Vec<u8>> {
    let mut next = key.to_vec();
    while let Some(last) = next.pop() {
        if last < u8::MAX {
            next.push(last + 1);
            return Some(next);
        }
    }
    None
}

/// A single value stored under a collection prefix.
pub struct Item<V> {
    backend: Arc<dyn StorageBackend>,
    prefix: [u8; PREFIX_LEN],
    _marker: PhantomData<fn() -> V>,
}

impl<V> Clone for Item<V> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            prefix: self.prefix,
            _marker: PhantomData,
        }
    }
}

impl<V: Serialize + DeserializeOwned> Item<V> {
    pub fn new(backend: Arc<dyn StorageBackend>, prefix: [u8; PREFIX_LEN]) -> Self {
        Self {
            backend,
            prefix,
            _marker: PhantomData,
        }
    }

    pub async fn get(&self) -> Result<Option<V>> {
        match self.backend.get(&self.prefix).await? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn get_or_default(&self) -> Result<V>
    where
        V: Default,
    {
        Ok(self.get().await?.unwrap_or_default())
    }

    pub async fn set(&self, value: &V) -> Result<()> {
        let bytes = bincode::serialize(value)?;
        self.backend.set(&self.prefix, &bytes).await
    }

    pub async fn remove(&self) -> Result<()> {
        self.backend.delete(&self.prefix).await
    }
}
