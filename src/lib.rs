// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! voxdag: a versioned datastore for large chunked image volumes.
//!
//! Versions form a DAG per dataset, with branching and immutable locked
//! snapshots. Every chunk of every data instance lives under one composite
//! key in a single ordered key-value engine:
//!
//! ```text
//! [keyspace][dataset id][data id][version id][datatype index]
//! ```
//!
//! Modules, leaves first:
//!
//! - [`storage`]: the ordered key-value engine contract and its engines
//! - [`index`]: chunk index encodings and the composite key builder
//! - [`dag`]: version DAGs
//! - [`datatype`]: datatype plugins (`voxels`, `multichan16`)
//! - [`datastore`]: datasets, version resolution, chunk reads and writes
//! - [`server`]: the command switchboard

pub mod dag;
pub mod datastore;
pub mod datatype;
pub mod index;
pub mod server;
pub mod storage;

pub use dag::{DagError, VersionDag, VersionUuid};
pub use datastore::{Datastore, DatastoreConfig, DatastoreError};
pub use datatype::{DataConfig, DataService, Datatype, DatatypeError, TypeRegistry};
pub use index::{ChunkPoint3d, IndexError, Point3d, Subvolume};
pub use storage::{DurabilityMode, Key, KeyValueStore, StorageError, Value};
