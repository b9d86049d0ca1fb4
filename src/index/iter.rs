// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Lazy traversal of chunk extents in index order.

use super::point::{ChunkExtents, ChunkPoint3d};
use super::zyx::{IndexBytes, IndexScheme};

/// An inclusive run of indices that are contiguous in key space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpan {
    pub begin: IndexBytes,
    pub end: IndexBytes,
}

/// Steps a chunk cursor through extents in z-major order.
///
/// Returns `None` once the cursor leaves the extents. Never overflows, even at
/// `i32::MAX` boundaries.
#[inline]
fn advance(ext: &ChunkExtents, p: ChunkPoint3d) -> Option<ChunkPoint3d> {
    if p.x < ext.end.x {
        return Some(ChunkPoint3d { x: p.x + 1, ..p });
    }
    if p.y < ext.end.y {
        return Some(ChunkPoint3d {
            x: ext.begin.x,
            y: p.y + 1,
            z: p.z,
        });
    }
    if p.z < ext.end.z {
        return Some(ChunkPoint3d {
            x: ext.begin.x,
            y: ext.begin.y,
            z: p.z + 1,
        });
    }
    None
}

/// Yields the index of every chunk in the extents, in ascending byte order.
///
/// Single-pass and forward-only; [`IndexIter::reset`] restarts from the first
/// chunk.
#[derive(Debug, Clone)]
pub struct IndexIter {
    extents: ChunkExtents,
    scheme: IndexScheme,
    cursor: Option<ChunkPoint3d>,
}

impl IndexIter {
    pub fn new(scheme: IndexScheme, extents: ChunkExtents) -> Self {
        let cursor = (!extents.is_empty()).then_some(extents.begin);
        Self {
            extents,
            scheme,
            cursor,
        }
    }

    /// Restarts the traversal from the first chunk.
    pub fn reset(&mut self) {
        self.cursor = (!self.extents.is_empty()).then_some(self.extents.begin);
    }

    pub fn scheme(&self) -> IndexScheme {
        self.scheme
    }

    pub fn extents(&self) -> &ChunkExtents {
        &self.extents
    }

    /// Like `next`, but also returns the chunk coordinate.
    pub fn next_point(&mut self) -> Option<(ChunkPoint3d, IndexBytes)> {
        let p = self.cursor?;
        self.cursor = advance(&self.extents, p);
        Some((p, self.scheme.encode(p)))
    }
}

impl Iterator for IndexIter {
    type Item = IndexBytes;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_point().map(|(_, idx)| idx)
    }
}

/// Yields one [`IndexSpan`] per `(z, y)` row of the extents.
///
/// Within a row only `x` varies, and `x` is the least significant component of
/// every scheme, so the row is one contiguous key range. Rows themselves are
/// separated by the x-values outside the extents and cannot be merged.
#[derive(Debug, Clone)]
pub struct SpanIter {
    extents: ChunkExtents,
    scheme: IndexScheme,
    // (y, z) of the next row.
    cursor: Option<(i32, i32)>,
}

impl SpanIter {
    pub fn new(scheme: IndexScheme, extents: ChunkExtents) -> Self {
        let cursor = (!extents.is_empty()).then_some((extents.begin.y, extents.begin.z));
        Self {
            extents,
            scheme,
            cursor,
        }
    }

    /// Restarts the traversal from the first row.
    pub fn reset(&mut self) {
        self.cursor = (!self.extents.is_empty()).then_some((self.extents.begin.y, self.extents.begin.z));
    }
}

impl Iterator for SpanIter {
    type Item = IndexSpan;

    fn next(&mut self) -> Option<Self::Item> {
        let (y, z) = self.cursor?;
        let ext = &self.extents;

        self.cursor = if y < ext.end.y {
            Some((y + 1, z))
        } else if z < ext.end.z {
            Some((ext.begin.y, z + 1))
        } else {
            None
        };

        Some(IndexSpan {
            begin: self.scheme.encode(ChunkPoint3d::new(ext.begin.x, y, z)),
            end: self.scheme.encode(ChunkPoint3d::new(ext.end.x, y, z)),
        })
    }
}
