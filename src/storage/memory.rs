// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! In-memory ordered storage engine.
//!
//! Backed by a `BTreeMap` behind a reader-writer lock. Range scans re-seek on
//! every pull, so an in-flight scan never holds the lock between elements and
//! observes writes that land after it started.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::engine::{validate_key, validate_value, BatchOp, KeyValueStore, ScanIter, WriteBatch};
use super::{Key, StorageError, Value};

type Tree = BTreeMap<Vec<u8>, Vec<u8>>;

/// Volatile ordered key-value engine.
#[derive(Default)]
pub struct MemoryStore {
    tree: Arc<RwLock<Tree>>,
    bulk: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.tree.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &Key) -> Result<Option<Value>, StorageError> {
        validate_key(key)?;
        Ok(self.tree.read().get(key.as_bytes()).cloned().map(Value::new))
    }

    fn multi_get(&self, keys: &[Key]) -> Result<Vec<Option<Value>>, StorageError> {
        for key in keys {
            validate_key(key)?;
        }
        let tree = self.tree.read();
        Ok(keys
            .iter()
            .map(|k| tree.get(k.as_bytes()).cloned().map(Value::new))
            .collect())
    }

    fn put(&self, key: Key, value: Value) -> Result<(), StorageError> {
        validate_key(&key)?;
        validate_value(&value)?;
        self.tree.write().insert(key.into_bytes(), value.into_bytes());
        Ok(())
    }

    fn delete(&self, key: &Key) -> Result<(), StorageError> {
        validate_key(key)?;
        self.tree.write().remove(key.as_bytes());
        Ok(())
    }

    fn scan<'a>(&'a self, begin: &Key, end: &Key) -> Result<ScanIter<'a>, StorageError> {
        validate_key(begin)?;
        validate_key(end)?;
        Ok(Box::new(MemoryScan {
            tree: Arc::clone(&self.tree),
            from: Bound::Included(begin.as_bytes().to_vec()),
            end: end.as_bytes().to_vec(),
            done: begin >= end,
        }))
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StorageError> {
        batch.validate()?;
        let count = batch.len();

        let mut tree = self.tree.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put(key, value) => {
                    tree.insert(key.into_bytes(), value.into_bytes());
                }
                BatchOp::Delete(key) => {
                    tree.remove(key.as_bytes());
                }
            }
        }
        drop(tree);

        debug!(ops = count, "applied write batch");
        Ok(())
    }

    fn delete_range(&self, begin: &Key, end: &Key) -> Result<(), StorageError> {
        if begin >= end {
            return Ok(());
        }
        let mut tree = self.tree.write();
        let doomed: Vec<Vec<u8>> = tree
            .range::<[u8], _>((
                Bound::Included(begin.as_bytes()),
                Bound::Excluded(end.as_bytes()),
            ))
            .map(|(k, _)| k.clone())
            .collect();
        for key in doomed {
            tree.remove(&key);
        }
        Ok(())
    }

    fn begin_bulk_load(&self) -> Result<(), StorageError> {
        self.bulk.store(true, Ordering::Release);
        Ok(())
    }

    fn end_bulk_load(&self) -> Result<(), StorageError> {
        self.bulk.store(false, Ordering::Release);
        Ok(())
    }

    fn is_bulk_loading(&self) -> bool {
        self.bulk.load(Ordering::Acquire)
    }

    fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Pull-based scan over a [`MemoryStore`].
struct MemoryScan {
    tree: Arc<RwLock<Tree>>,
    from: Bound<Vec<u8>>,
    end: Vec<u8>,
    done: bool,
}

impl Iterator for MemoryScan {
    type Item = Result<(Key, Value), StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let next = {
            let tree = self.tree.read();
            let lower = match &self.from {
                Bound::Included(k) => Bound::Included(k.as_slice()),
                Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
                Bound::Unbounded => Bound::Unbounded,
            };
            tree.range::<[u8], _>((lower, Bound::Excluded(self.end.as_slice())))
                .next()
                .map(|(k, v)| (k.clone(), v.clone()))
        };

        match next {
            Some((k, v)) => {
                self.from = Bound::Excluded(k.clone());
                Some(Ok((Key::new(k), Value::new(v))))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn collect(store: &MemoryStore, begin: &str, end: &str) -> Vec<String> {
        store
            .scan(&Key::from(begin), &Key::from(end))
            .unwrap()
            .map(|item| String::from_utf8(item.unwrap().0.into_bytes()).unwrap())
            .collect()
    }

    #[test]
    fn test_put_get_delete() {
        let store = MemoryStore::new();
        let key = Key::from("hello");

        assert_eq!(store.get(&key).unwrap(), None);
        store.put(key.clone(), Value::from("world")).unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(Value::from("world")));

        store.put(key.clone(), Value::from("again")).unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(Value::from("again")));

        store.delete(&key).unwrap();
        assert_eq!(store.get(&key).unwrap(), None);
        // Deleting a missing key is fine.
        store.delete(&key).unwrap();
    }

    #[test]
    fn test_scan_is_half_open() {
        let store = MemoryStore::new();
        for k in ["aaa", "bbb", "ccc", "ddd"] {
            store.put(Key::from(k), Value::from("v")).unwrap();
        }

        assert_eq!(collect(&store, "bbb", "ddd"), vec!["bbb", "ccc"]);
        assert_eq!(collect(&store, "a", "z"), vec!["aaa", "bbb", "ccc", "ddd"]);
    }

    #[test]
    fn test_scan_empty_and_inverted_ranges() {
        let store = MemoryStore::new();
        store.put(Key::from("k"), Value::from("v")).unwrap();

        assert!(collect(&store, "k", "k").is_empty());
        assert!(collect(&store, "z", "a").is_empty());
        assert!(collect(&store, "x", "y").is_empty());
    }

    #[test]
    fn test_scan_does_not_hold_lock_between_pulls() {
        let store = MemoryStore::new();
        store.put(Key::from("a"), Value::from("1")).unwrap();
        store.put(Key::from("c"), Value::from("3")).unwrap();

        let mut iter = store.scan(&Key::from("a"), &Key::from("z")).unwrap();
        let first = iter.next().unwrap().unwrap();
        assert_eq!(first.0, Key::from("a"));

        // A write between pulls must not deadlock and is visible to the scan.
        store.put(Key::from("b"), Value::from("2")).unwrap();

        let rest: Vec<Key> = iter.map(|i| i.unwrap().0).collect();
        assert_eq!(rest, vec![Key::from("b"), Key::from("c")]);
    }

    #[test]
    fn test_delete_range() {
        let store = MemoryStore::new();
        for k in ["a", "b", "c", "d"] {
            store.put(Key::from(k), Value::from("v")).unwrap();
        }
        store.delete_range(&Key::from("b"), &Key::from("d")).unwrap();
        assert_eq!(collect(&store, "a", "z"), vec!["a", "d"]);
    }

    #[test]
    fn test_multi_get() {
        let store = MemoryStore::new();
        store.put(Key::from("k1"), Value::from("v1")).unwrap();

        let got = store
            .multi_get(&[Key::from("k1"), Key::from("k2")])
            .unwrap();
        assert_eq!(got, vec![Some(Value::from("v1")), None]);
    }

    #[test]
    fn test_bulk_load_flag() {
        let store = MemoryStore::new();
        assert!(!store.is_bulk_loading());
        {
            let _guard = crate::storage::BulkLoad::begin(&store).unwrap();
            assert!(store.is_bulk_loading());
        }
        assert!(!store.is_bulk_loading());
    }

    #[test]
    fn test_batch_atomic_for_snapshot_readers() {
        let store = Arc::new(MemoryStore::new());
        let a = Key::from("a");
        let b = Key::from("b");
        store.put(a.clone(), Value::from("x")).unwrap();

        // Invariant: exactly one of `a` and `b` exists at every snapshot.
        let writer = {
            let store = Arc::clone(&store);
            let (a, b) = (a.clone(), b.clone());
            thread::spawn(move || {
                for i in 0..2000 {
                    let mut batch = WriteBatch::new();
                    if i % 2 == 0 {
                        batch.put(b.clone(), Value::from("x")).delete(a.clone());
                    } else {
                        batch.put(a.clone(), Value::from("x")).delete(b.clone());
                    }
                    store.write_batch(batch).unwrap();
                }
            })
        };

        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..2000 {
                    let got = store.multi_get(&[a.clone(), b.clone()]).unwrap();
                    let present = got.iter().filter(|v| v.is_some()).count();
                    assert_eq!(present, 1, "observed a half-applied batch");
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
    }
}
