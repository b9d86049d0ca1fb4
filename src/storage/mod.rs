// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The ordered key-value storage contract and its engines.
//!
//! Everything above this module talks to storage through [`KeyValueStore`]:
//!
//! - **Point ops**: `get` (absence is `Ok(None)`), `put`, `delete`
//! - **Range scans**: lazy, ascending, half-open `[begin, end)`; an empty
//!   range yields an empty sequence
//! - **Batches**: [`WriteBatch`] commits all-or-nothing
//! - **Bulk load**: a mode that trades crash-safety for ingest throughput,
//!   scoped with the [`BulkLoad`] guard
//!
//! Two engines ship with the crate: [`MemoryStore`] and [`RocksStore`].
//!
//! # Example
//!
//! ```no_run
//! use voxdag::storage::{Key, KeyValueStore, RocksStore, Value, WriteBatch};
//! use std::path::Path;
//!
//! let store = RocksStore::open(Path::new("/tmp/voxdag")).unwrap();
//!
//! let mut batch = WriteBatch::new();
//! batch.put(Key::from("chunk"), Value::from("payload"));
//! batch.delete(Key::from("stale"));
//! store.write_batch(batch).unwrap();
//!
//! for item in store.scan(&Key::from("a"), &Key::from("z")).unwrap() {
//!     let (key, value) = item.unwrap();
//!     println!("{:?} -> {} bytes", key, value.len());
//! }
//! ```

mod engine;
mod error;
mod memory;
mod rocks;

pub use engine::{
    BatchOp, BulkLoad, Key, KeyValueStore, ScanIter, Value, WriteBatch, MAX_KEY_SIZE,
    MAX_VALUE_SIZE,
};
pub use error::StorageError;
pub use memory::MemoryStore;
pub use rocks::{DurabilityMode, RocksStore};
