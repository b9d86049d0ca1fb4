// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The versioned datastore.
//!
//! A [`Datastore`] owns one storage engine and a table of [`Dataset`]s. Each
//! dataset has a version DAG and a set of named data instances. Requests name
//! a version by uuid (or an unambiguous uuid prefix) and a data instance; the
//! datastore resolves both to local ids, asks the datatype for index bytes,
//! builds composite keys, and talks to the engine.
//!
//! # Persistence
//!
//! All metadata lives in the engine's metadata keyspace, each record wrapped
//! in a tagged envelope (see [`RecordKind`]):
//!
//! - `registry`: the next dataset id and the list of datasets
//! - `dag/<id>`: one dataset's full version DAG
//! - `dataset/<id>`: one dataset's data instances and their configuration
//!
//! # Concurrency
//!
//! Writes to a version hold that dataset's DAG lock shared for both the lock
//! check and the engine write; branching and locking hold it exclusively.
//! A write racing a lock therefore either completes first or is rejected with
//! [`DatastoreError::VersionLocked`].

mod codec;
mod config;
mod dataset;
mod error;
mod store;

pub use codec::{RecordKind, FORMAT_VERSION};
pub use config::{DatastoreConfig, EngineConfig};
pub use dataset::Dataset;
pub use error::DatastoreError;
pub use store::{Datastore, VersionRef};
