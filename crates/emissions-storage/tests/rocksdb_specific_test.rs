#[cfg(feature = "rocksdb")]
mod rocksdb_tests {
    use emissions_storage::{hash_prefix, Map, RocksBackend, StorageBackend};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_rocksdb_persistence_across_restarts() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().to_path_buf();
        let key = (7u64, "reputer".to_string());

        {
            let backend: Arc<dyn StorageBackend> = Arc::new(RocksBackend::new(&path).unwrap());
            let stakes: Map<(u64, String), u128> = Map::new(backend.clone(), hash_prefix(b"stakes"));
            stakes.set(&key, &42).await.unwrap();
            backend.flush().await.unwrap();
        }

        let backend: Arc<dyn StorageBackend> = Arc::new(RocksBackend::new(&path).unwrap());
        let stakes: Map<(u64, String), u128> = Map::new(backend, hash_prefix(b"stakes"));
        assert_eq!(stakes.get(&key).await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn test_rocksdb_overlay_visibility_and_rollback() {
        let temp_dir = tempdir().unwrap();
        let backend = RocksBackend::new(temp_dir.path()).unwrap();

        backend.set(b"pk1", b"committed").await.unwrap();
        backend.set(b"pk2", b"doomed").await.unwrap();

        backend.begin_transaction().await.unwrap();
        backend.set(b"pk1", b"staged").await.unwrap();
        backend.delete(b"pk2").await.unwrap();
        backend.set(b"pk3", b"new").await.unwrap();

        assert_eq!(backend.get(b"pk1").await.unwrap(), Some(b"staged".to_vec()));
        assert_eq!(backend.get(b"pk2").await.unwrap(), None);
        let staged: Vec<_> = backend
            .iterate_prefix(b"pk")
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(staged, vec![b"pk1".to_vec(), b"pk3".to_vec()]);

        backend.rollback_transaction().await.unwrap();
        assert_eq!(backend.get(b"pk1").await.unwrap(), Some(b"committed".to_vec()));
        assert_eq!(backend.get(b"pk2").await.unwrap(), Some(b"doomed".to_vec()));
        assert_eq!(backend.get(b"pk3").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rocksdb_range_merges_overlay() {
        let temp_dir = tempdir().unwrap();
        let backend = RocksBackend::new(temp_dir.path()).unwrap();

        for key in [b"rk1", b"rk2", b"rk3", b"rk5", b"rk7"] {
            backend.set(key, b"committed").await.unwrap();
        }

        backend.begin_transaction().await.unwrap();
        backend.delete(b"rk1").await.unwrap();
        backend.delete(b"rk2").await.unwrap();
        backend.set(b"rk4", b"staged").await.unwrap();

        let keys: Vec<_> = backend
            .iterate_range(b"rk", Some(&b"rk7"[..]), 3)
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"rk3".to_vec(), b"rk4".to_vec(), b"rk5".to_vec()]);

        let open_ended = backend.iterate_range(b"rk6", None, 10).await.unwrap();
        assert_eq!(open_ended, vec![(b"rk7".to_vec(), b"committed".to_vec())]);
        backend.rollback_transaction().await.unwrap();
    }

    #[tokio::test]
    async fn test_rocksdb_commit_writes_batch() {
        let temp_dir = tempdir().unwrap();
        let backend = RocksBackend::new(temp_dir.path()).unwrap();

        backend.begin_transaction().await.unwrap();
        backend.set(b"a", b"1").await.unwrap();
        backend.set(b"b", b"2").await.unwrap();
        backend.commit_transaction().await.unwrap();

        let stats = backend.get_stats().await.unwrap();
        assert_eq!(stats.key_count, 2);
        assert!(!stats.in_transaction);
    }
}
