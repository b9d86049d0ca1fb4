// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The storage engine contract and the types that cross it.

use std::fmt;

use tracing::warn;

use super::error::StorageError;

/// Maximum key size in bytes.
pub const MAX_KEY_SIZE: usize = 8 * 1024; // 8KB

/// Maximum value size in bytes.
pub const MAX_VALUE_SIZE: usize = 64 * 1024 * 1024; // 64MB

/// A key in the ordered key space. Ordering is plain byte-lexicographic.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(pub Vec<u8>);

impl Key {
    /// Creates a new key from bytes.
    #[inline]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the key bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the key.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the key is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the key and returns its bytes.
    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key(")?;
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

impl From<&[u8]> for Key {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Key {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// An opaque value stored under a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value(pub Vec<u8>);

impl Value {
    /// Creates a new value from bytes.
    #[inline]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the value bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the value.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the value is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the value and returns its bytes.
    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl AsRef<[u8]> for Value {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// One mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put(Key, Value),
    Delete(Key),
}

impl BatchOp {
    /// Returns the key this operation targets.
    pub fn key(&self) -> &Key {
        match self {
            BatchOp::Put(key, _) | BatchOp::Delete(key) => key,
        }
    }
}

/// A set of puts and deletes that an engine commits all-or-nothing.
///
/// Operations apply in insertion order, so a later op on the same key wins.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a put.
    pub fn put(&mut self, key: Key, value: Value) -> &mut Self {
        self.ops.push(BatchOp::Put(key, value));
        self
    }

    /// Queues a delete.
    pub fn delete(&mut self, key: Key) -> &mut Self {
        self.ops.push(BatchOp::Delete(key));
        self
    }

    /// Appends every operation of `other`.
    pub fn extend(&mut self, other: WriteBatch) {
        self.ops.extend(other.ops);
    }

    /// Number of queued operations.
    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Iterates the queued operations in order.
    pub fn ops(&self) -> impl Iterator<Item = &BatchOp> {
        self.ops.iter()
    }

    /// Consumes the batch, yielding its operations.
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }

    /// Checks every key and value against the engine size limits.
    pub fn validate(&self) -> Result<(), StorageError> {
        for op in &self.ops {
            validate_key(op.key())?;
            if let BatchOp::Put(_, value) = op {
                validate_value(value)?;
            }
        }
        Ok(())
    }
}

/// A lazy, ascending sequence of key-value pairs produced by a range scan.
///
/// Dropping the iterator abandons the scan.
pub type ScanIter<'a> = Box<dyn Iterator<Item = Result<(Key, Value), StorageError>> + 'a>;

/// The ordered key-value contract every backend implements.
///
/// Higher layers depend only on this trait. Engine failures are returned as
/// [`StorageError`] and are never retried at this level.
pub trait KeyValueStore: Send + Sync {
    /// Short engine name for diagnostics.
    fn name(&self) -> &'static str;

    /// Reads a key. A missing key is `Ok(None)`.
    fn get(&self, key: &Key) -> Result<Option<Value>, StorageError>;

    /// Reads several keys from a single consistent snapshot.
    fn multi_get(&self, keys: &[Key]) -> Result<Vec<Option<Value>>, StorageError>;

    /// Writes a value, replacing any previous value atomically.
    fn put(&self, key: Key, value: Value) -> Result<(), StorageError>;

    /// Removes a key. Removing a missing key is not an error.
    fn delete(&self, key: &Key) -> Result<(), StorageError>;

    /// Scans `[begin, end)` in ascending key order.
    ///
    /// An empty or inverted range yields an empty sequence.
    fn scan<'a>(&'a self, begin: &Key, end: &Key) -> Result<ScanIter<'a>, StorageError>;

    /// Commits every operation of `batch` atomically.
    fn write_batch(&self, batch: WriteBatch) -> Result<(), StorageError>;

    /// Removes every key in `[begin, end)`.
    ///
    /// The default collects the keys with a scan and deletes them in one batch.
    fn delete_range(&self, begin: &Key, end: &Key) -> Result<(), StorageError> {
        let mut batch = WriteBatch::new();
        for item in self.scan(begin, end)? {
            let (key, _) = item?;
            batch.delete(key);
        }
        if batch.is_empty() {
            return Ok(());
        }
        self.write_batch(batch)
    }

    /// Enters bulk-load mode. While active, writes may skip durability and
    /// callers must not rely on atomicity across crashes.
    fn begin_bulk_load(&self) -> Result<(), StorageError>;

    /// Leaves bulk-load mode and makes everything written so far durable.
    fn end_bulk_load(&self) -> Result<(), StorageError>;

    /// Returns true while bulk-load mode is active.
    fn is_bulk_loading(&self) -> bool;

    /// Forces buffered writes to stable storage.
    fn flush(&self) -> Result<(), StorageError>;
}

/// Scoped bulk-load mode. Leaves the mode when dropped.
pub struct BulkLoad<'a> {
    store: &'a dyn KeyValueStore,
    finished: bool,
}

impl<'a> BulkLoad<'a> {
    /// Puts `store` into bulk-load mode for the lifetime of the guard.
    pub fn begin(store: &'a dyn KeyValueStore) -> Result<Self, StorageError> {
        store.begin_bulk_load()?;
        Ok(Self {
            store,
            finished: false,
        })
    }

    /// Ends bulk-load mode and reports any error from the final flush.
    pub fn finish(mut self) -> Result<(), StorageError> {
        self.finished = true;
        self.store.end_bulk_load()
    }
}

impl Drop for BulkLoad<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.store.end_bulk_load() {
                warn!(engine = self.store.name(), error = %e, "failed to leave bulk-load mode");
            }
        }
    }
}

/// Validates key size.
pub(crate) fn validate_key(key: &Key) -> Result<(), StorageError> {
    if key.len() > MAX_KEY_SIZE {
        return Err(StorageError::KeyTooLarge {
            size: key.len(),
            max: MAX_KEY_SIZE,
        });
    }
    Ok(())
}

/// Validates value size.
pub(crate) fn validate_value(value: &Value) -> Result<(), StorageError> {
    if value.len() > MAX_VALUE_SIZE {
        return Err(StorageError::ValueTooLarge {
            size: value.len(),
            max: MAX_VALUE_SIZE,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_bytes() {
        let key = Key::from(b"hello".as_slice());
        assert_eq!(key.as_bytes(), b"hello");
        assert_eq!(key.len(), 5);
    }

    #[test]
    fn test_key_debug_is_hex() {
        let key = Key::new(vec![0x01, 0xab]);
        assert_eq!(format!("{:?}", key), "Key(01ab)");
    }

    #[test]
    fn test_batch_preserves_order() {
        let mut batch = WriteBatch::new();
        batch
            .put(Key::from("a"), Value::from("1"))
            .delete(Key::from("b"));

        let ops: Vec<_> = batch.ops().cloned().collect();
        assert_eq!(
            ops,
            vec![
                BatchOp::Put(Key::from("a"), Value::from("1")),
                BatchOp::Delete(Key::from("b")),
            ]
        );
    }

    #[test]
    fn test_batch_validate_rejects_large_key() {
        let mut batch = WriteBatch::new();
        batch.put(Key::new(vec![0u8; MAX_KEY_SIZE + 1]), Value::from("v"));
        assert!(matches!(
            batch.validate(),
            Err(StorageError::KeyTooLarge { .. })
        ));
    }
}
