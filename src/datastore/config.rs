// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Configuration for opening a datastore.

use std::path::PathBuf;
use std::sync::Arc;

use super::DatastoreError;
use crate::storage::{DurabilityMode, KeyValueStore, MemoryStore, RocksStore};

/// Which storage engine backs the datastore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineConfig {
    /// Volatile in-memory engine.
    Memory,
    /// RocksDB database directory.
    RocksDb { path: PathBuf },
}

/// Configuration for [`Datastore::open_with_config`](super::Datastore::open_with_config).
#[derive(Debug, Clone)]
pub struct DatastoreConfig {
    /// Storage engine.
    pub engine: EngineConfig,
    /// Durability of ordinary (non-bulk) writes.
    pub durability: DurabilityMode,
    /// Initialize an empty datastore when none exists.
    pub create_if_missing: bool,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::Memory,
            durability: DurabilityMode::default(),
            create_if_missing: true,
        }
    }
}

impl DatastoreConfig {
    /// An in-memory datastore.
    pub fn memory() -> Self {
        Self::default()
    }

    /// A RocksDB datastore at `path`.
    pub fn rocksdb(path: impl Into<PathBuf>) -> Self {
        Self {
            engine: EngineConfig::RocksDb { path: path.into() },
            ..Self::default()
        }
    }

    /// Sets the durability mode.
    pub fn with_durability(mut self, durability: DurabilityMode) -> Self {
        self.durability = durability;
        self
    }

    /// Sets whether a missing datastore is created.
    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Opens the configured engine.
    pub(crate) fn open_engine(&self) -> Result<Arc<dyn KeyValueStore>, DatastoreError> {
        match &self.engine {
            EngineConfig::Memory => Ok(Arc::new(MemoryStore::new())),
            EngineConfig::RocksDb { path } => {
                if !self.create_if_missing && !path.exists() {
                    return Err(DatastoreError::NotInitialized(path.display().to_string()));
                }
                Ok(Arc::new(RocksStore::open_with_durability(path, self.durability)?))
            }
        }
    }
}
