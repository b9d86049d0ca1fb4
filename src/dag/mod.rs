// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Version history: branching, locking, and provenance.
//!
//! Each dataset owns one [`VersionDag`]. Versions are created only by
//! branching from an existing version, are mutated only by locking or by
//! annotating their provenance note, and are never deleted. Within a DAG,
//! [`VersionLocalId`](crate::index::VersionLocalId)s are handed out
//! monotonically starting at 1 for the root.
//!
//! # Example
//!
//! ```
//! use voxdag::dag::VersionDag;
//!
//! let mut dag = VersionDag::new();
//! let root = dag.root();
//! dag.lock(&root).unwrap();
//!
//! let (child, id) = dag.new_version(&root).unwrap();
//! assert_eq!(id.get(), 2);
//! assert!(!dag.is_locked(&child).unwrap());
//! ```

mod clock;
mod error;
mod node;
mod version;

pub use clock::ProvenanceClock;
pub use error::DagError;
pub use node::{Node, VersionUuid};
pub use version::{DagRecord, VersionDag, ROOT_VERSION_ID};
