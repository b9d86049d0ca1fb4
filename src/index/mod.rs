// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Spatial indexing and the composite key scheme.
//!
//! A datatype turns a chunk coordinate into an [`IndexBytes`] fragment whose
//! byte order equals its traversal order. [`build_key`] then prefixes the
//! fragment with the dataset, data instance, and version ids, giving one
//! totally ordered key space for every chunk in the datastore:
//!
//! ```text
//! [keyspace][dataset][data][version][index.............]
//!      1        4       4      4     12 (zyx) / 16 (czyx)
//! ```
//!
//! Because the version sits before the index, all chunks of one version of
//! one data instance form a single contiguous range, and a row of chunks
//! along x is a contiguous sub-range of it.
//!
//! # Example
//!
//! ```
//! use voxdag::index::{
//!     build_key, DataLocalId, DatasetLocalId, IndexIter, IndexScheme, Point3d, Subvolume,
//!     VersionLocalId,
//! };
//!
//! let sub = Subvolume::new(Point3d::new(0, 0, 0), Point3d::new(64, 32, 32));
//! let extents = sub.chunk_extents(&Point3d::cube(32)).unwrap();
//!
//! let keys: Vec<_> = IndexIter::new(IndexScheme::Zyx, extents)
//!     .map(|idx| build_key(DatasetLocalId(1), DataLocalId(1), VersionLocalId(1), idx.as_bytes()))
//!     .collect();
//! assert_eq!(keys.len(), 2);
//! assert!(keys[0] < keys[1]);
//! ```

mod error;
mod iter;
mod key;
mod point;
mod zyx;

pub use error::IndexError;
pub use iter::{IndexIter, IndexSpan, SpanIter};
pub use key::{
    build_key, decode_key, index_prefix_range, meta_key, prefix_end, prefix_range, span_range,
    successor, version_prefix, ChunkKey, DataLocalId, DatasetLocalId, VersionLocalId,
    CHUNK_KEY_HEADER, KEYSPACE_CHUNK, KEYSPACE_META,
};
pub use point::{ChunkExtents, ChunkPoint3d, Point3d, Subvolume};
pub use zyx::{Index, IndexBytes, IndexCzyx, IndexScheme, IndexZyx};
