// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! RocksDB-backed storage engine.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use rocksdb::{DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options, WriteOptions};
use tracing::{debug, info};

use super::engine::{validate_key, validate_value, BatchOp, KeyValueStore, ScanIter, WriteBatch};
use super::{Key, StorageError, Value};

/// Durability mode for write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// Writes are synced to WAL but not fsynced to disk.
    /// Durable against process crashes but not power failures.
    #[default]
    WalOnly,
    /// Writes are fsynced to disk on every operation.
    FsyncEveryWrite,
}

/// RocksDB-backed ordered key-value engine.
///
/// Chunk keys share long prefixes (dataset, data instance, version), so the
/// default byte-order comparator gives exactly the scan order the key
/// builder promises.
pub struct RocksStore {
    db: DBWithThreadMode<MultiThreaded>,
    write_opts: WriteOptions,
    bulk_write_opts: WriteOptions,
    bulk: AtomicBool,
}

impl RocksStore {
    /// Opens or creates a RocksDB database at the given path.
    ///
    /// Uses `DurabilityMode::WalOnly` by default.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Self::open_with_durability(path, DurabilityMode::default())
    }

    /// Opens or creates a RocksDB database with specified durability mode.
    pub fn open_with_durability(
        path: &Path,
        durability: DurabilityMode,
    ) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        // Chunk payloads are large; favor big memtables and files.
        opts.set_write_buffer_size(64 * 1024 * 1024); // 64MB
        opts.set_max_write_buffer_number(4);
        opts.set_target_file_size_base(64 * 1024 * 1024);
        opts.set_level_compaction_dynamic_level_bytes(true);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);

        Self::open_with_options(path, opts, durability)
    }

    /// Opens a database with custom RocksDB options.
    pub fn open_with_options(
        path: &Path,
        opts: Options,
        durability: DurabilityMode,
    ) -> Result<Self, StorageError> {
        // RocksDB creates only the last path component.
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = DBWithThreadMode::open(&opts, path)?;

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(durability == DurabilityMode::FsyncEveryWrite);

        let mut bulk_write_opts = WriteOptions::default();
        bulk_write_opts.set_sync(false);
        bulk_write_opts.disable_wal(true);

        info!(path = %path.display(), ?durability, "opened rocksdb store");

        Ok(Self {
            db,
            write_opts,
            bulk_write_opts,
            bulk: AtomicBool::new(false),
        })
    }

    /// Write options for the current mode.
    #[inline]
    fn opts(&self) -> &WriteOptions {
        if self.bulk.load(Ordering::Acquire) {
            &self.bulk_write_opts
        } else {
            &self.write_opts
        }
    }

    fn to_rocks_batch(batch: WriteBatch) -> rocksdb::WriteBatch {
        let mut rb = rocksdb::WriteBatch::default();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put(key, value) => rb.put(key.as_bytes(), value.as_bytes()),
                BatchOp::Delete(key) => rb.delete(key.as_bytes()),
            }
        }
        rb
    }
}

impl KeyValueStore for RocksStore {
    fn name(&self) -> &'static str {
        "rocksdb"
    }

    fn get(&self, key: &Key) -> Result<Option<Value>, StorageError> {
        validate_key(key)?;
        Ok(self.db.get(key.as_bytes())?.map(Value::new))
    }

    fn multi_get(&self, keys: &[Key]) -> Result<Vec<Option<Value>>, StorageError> {
        for key in keys {
            validate_key(key)?;
        }
        let snapshot = self.db.snapshot();
        keys.iter()
            .map(|k| Ok(snapshot.get(k.as_bytes())?.map(Value::new)))
            .collect()
    }

    fn put(&self, key: Key, value: Value) -> Result<(), StorageError> {
        validate_key(&key)?;
        validate_value(&value)?;
        self.db.put_opt(key.as_bytes(), value.as_bytes(), self.opts())?;
        Ok(())
    }

    fn delete(&self, key: &Key) -> Result<(), StorageError> {
        validate_key(key)?;
        self.db.delete_opt(key.as_bytes(), self.opts())?;
        Ok(())
    }

    fn scan<'a>(&'a self, begin: &Key, end: &Key) -> Result<ScanIter<'a>, StorageError> {
        validate_key(begin)?;
        validate_key(end)?;
        if begin >= end {
            return Ok(Box::new(std::iter::empty()));
        }

        let end = end.as_bytes().to_vec();
        let iter = self
            .db
            .iterator(IteratorMode::From(begin.as_bytes(), Direction::Forward))
            .map(|item| {
                item.map(|(k, v)| (Key::new(k.into_vec()), Value::new(v.into_vec())))
                    .map_err(StorageError::from)
            })
            .take_while(move |item| match item {
                Ok((k, _)) => k.as_bytes() < end.as_slice(),
                Err(_) => true,
            });

        Ok(Box::new(iter))
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StorageError> {
        batch.validate()?;
        let count = batch.len();
        self.db.write_opt(Self::to_rocks_batch(batch), self.opts())?;
        debug!(ops = count, "applied write batch");
        Ok(())
    }

    fn delete_range(&self, begin: &Key, end: &Key) -> Result<(), StorageError> {
        validate_key(begin)?;
        validate_key(end)?;
        if begin >= end {
            return Ok(());
        }
        let mut rb = rocksdb::WriteBatch::default();
        rb.delete_range(begin.as_bytes(), end.as_bytes());
        self.db.write_opt(rb, self.opts())?;
        Ok(())
    }

    fn begin_bulk_load(&self) -> Result<(), StorageError> {
        self.bulk.store(true, Ordering::Release);
        debug!("rocksdb entering bulk-load mode");
        Ok(())
    }

    fn end_bulk_load(&self) -> Result<(), StorageError> {
        self.bulk.store(false, Ordering::Release);
        // Bulk writes bypassed the WAL; persist memtables before reporting done.
        self.db.flush()?;
        debug!("rocksdb left bulk-load mode");
        Ok(())
    }

    fn is_bulk_loading(&self) -> bool {
        self.bulk.load(Ordering::Acquire)
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BulkLoad, MAX_KEY_SIZE, MAX_VALUE_SIZE};
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn test_write_read_basic() {
        let (store, _dir) = create_test_store();

        let key = Key::from("hello");
        store.put(key.clone(), Value::from("world")).unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(Value::from("world")));
    }

    #[test]
    fn test_read_not_found() {
        let (store, _dir) = create_test_store();
        assert_eq!(store.get(&Key::from("nonexistent")).unwrap(), None);
    }

    #[test]
    fn test_overwrite_and_delete() {
        let (store, _dir) = create_test_store();
        let key = Key::from("key");

        store.put(key.clone(), Value::from("v1")).unwrap();
        store.put(key.clone(), Value::from("v2")).unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(Value::from("v2")));

        store.delete(&key).unwrap();
        assert_eq!(store.get(&key).unwrap(), None);
    }

    #[test]
    fn test_batch_write() {
        let (store, _dir) = create_test_store();
        store.put(Key::from("key3"), Value::from("old")).unwrap();

        let mut batch = WriteBatch::new();
        batch
            .put(Key::from("key1"), Value::from("value1"))
            .put(Key::from("key2"), Value::from("value2"))
            .delete(Key::from("key3"));
        store.write_batch(batch).unwrap();

        assert_eq!(store.get(&Key::from("key1")).unwrap(), Some(Value::from("value1")));
        assert_eq!(store.get(&Key::from("key2")).unwrap(), Some(Value::from("value2")));
        assert_eq!(store.get(&Key::from("key3")).unwrap(), None);
    }

    #[test]
    fn test_scan() {
        let (store, _dir) = create_test_store();
        for k in ["aaa", "bbb", "ccc", "ddd"] {
            store.put(Key::from(k), Value::from("v")).unwrap();
        }

        // Scan [bbb, ddd) - should get bbb and ccc
        let keys: Vec<Key> = store
            .scan(&Key::from("bbb"), &Key::from("ddd"))
            .unwrap()
            .map(|i| i.unwrap().0)
            .collect();
        assert_eq!(keys, vec![Key::from("bbb"), Key::from("ccc")]);
    }

    #[test]
    fn test_scan_empty_range() {
        let (store, _dir) = create_test_store();
        store.put(Key::from("k"), Value::from("v")).unwrap();

        assert_eq!(store.scan(&Key::from("k"), &Key::from("k")).unwrap().count(), 0);
        assert_eq!(store.scan(&Key::from("z"), &Key::from("a")).unwrap().count(), 0);
    }

    #[test]
    fn test_delete_range() {
        let (store, _dir) = create_test_store();
        for k in ["a", "b", "c", "d"] {
            store.put(Key::from(k), Value::from("v")).unwrap();
        }
        store.delete_range(&Key::from("b"), &Key::from("d")).unwrap();

        let keys: Vec<Key> = store
            .scan(&Key::from("a"), &Key::from("z"))
            .unwrap()
            .map(|i| i.unwrap().0)
            .collect();
        assert_eq!(keys, vec![Key::from("a"), Key::from("d")]);
    }

    #[test]
    fn test_multi_get_snapshot() {
        let (store, _dir) = create_test_store();
        store.put(Key::from("key1"), Value::from("value1")).unwrap();
        store.put(Key::from("key2"), Value::from("value2")).unwrap();

        let got = store
            .multi_get(&[Key::from("key1"), Key::from("key2"), Key::from("key3")])
            .unwrap();
        assert_eq!(
            got,
            vec![Some(Value::from("value1")), Some(Value::from("value2")), None]
        );
    }

    #[test]
    fn test_bulk_load_round_trip() {
        let dir = TempDir::new().unwrap();
        {
            let store = RocksStore::open(dir.path()).unwrap();
            let guard = BulkLoad::begin(&store).unwrap();
            assert!(store.is_bulk_loading());
            for i in 0..100u32 {
                store
                    .put(Key::new(i.to_be_bytes().to_vec()), Value::from("chunk"))
                    .unwrap();
            }
            guard.finish().unwrap();
            assert!(!store.is_bulk_loading());
        }

        // Flushed on finish, so a reopen sees every bulk write.
        let store = RocksStore::open(dir.path()).unwrap();
        let count = store
            .scan(&Key::new(vec![0]), &Key::new(vec![0xff]))
            .unwrap()
            .count();
        assert_eq!(count, 100);
    }

    #[test]
    fn test_key_too_large() {
        let (store, _dir) = create_test_store();

        let large_key = Key::new(vec![0u8; MAX_KEY_SIZE + 1]);
        let result = store.put(large_key, Value::from("value"));
        assert!(matches!(result, Err(StorageError::KeyTooLarge { .. })));
    }

    #[test]
    fn test_value_too_large() {
        let (store, _dir) = create_test_store();

        let large_value = Value::new(vec![0u8; MAX_VALUE_SIZE + 1]);
        let result = store.put(Key::from("key"), large_value);
        assert!(matches!(result, Err(StorageError::ValueTooLarge { .. })));
    }

    #[test]
    fn test_open_nested_path() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(&dir.path().join("a").join("b").join("db")).unwrap();
        store.put(Key::from("k"), Value::from("v")).unwrap();
        assert_eq!(store.get(&Key::from("k")).unwrap(), Some(Value::from("v")));
    }

    #[test]
    fn test_open_under_file_fails() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"not a directory").unwrap();
        let result = RocksStore::open(&file.join("sub").join("db"));
        assert!(matches!(result, Err(StorageError::Io(_))));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn scan_returns_sorted_keys_within_bounds(
            keys in prop::collection::btree_set(prop::collection::vec(any::<u8>(), 1..8), 0..40),
            lo in prop::collection::vec(any::<u8>(), 1..4),
            hi in prop::collection::vec(any::<u8>(), 1..4),
        ) {
            let dir = TempDir::new().unwrap();
            let store = RocksStore::open(dir.path()).unwrap();
            for k in &keys {
                store.put(Key::new(k.clone()), Value::from("v")).unwrap();
            }

            let got: Vec<Vec<u8>> = store
                .scan(&Key::new(lo.clone()), &Key::new(hi.clone()))
                .unwrap()
                .map(|i| i.unwrap().0.into_bytes())
                .collect();
            let want: Vec<Vec<u8>> = keys
                .iter()
                .filter(|k| **k >= lo && **k < hi)
                .cloned()
                .collect();

            prop_assert_eq!(got, want);
        }
    }
}
