// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Voxel-space and chunk-space coordinates.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::IndexError;

/// A voxel coordinate (or a size in voxels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point3d {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Point3d {
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// A cube with the same extent on every axis.
    #[inline]
    pub const fn cube(n: i32) -> Self {
        Self { x: n, y: n, z: n }
    }

    /// Number of voxels in a box of this size, or `None` if it does not fit
    /// in a `u64`.
    pub fn volume(&self) -> Option<u64> {
        (self.x.max(0) as u64)
            .checked_mul(self.y.max(0) as u64)?
            .checked_mul(self.z.max(0) as u64)
    }

    /// Returns the chunk containing this voxel for the given block size.
    ///
    /// Uses floor division, so voxel -1 lies in chunk -1 rather than chunk 0.
    #[inline]
    pub fn chunk(&self, block_size: &Point3d) -> ChunkPoint3d {
        ChunkPoint3d {
            x: self.x.div_euclid(block_size.x),
            y: self.y.div_euclid(block_size.y),
            z: self.z.div_euclid(block_size.z),
        }
    }

    /// Checks that this is usable as a block size.
    pub fn validate_block_size(&self) -> Result<(), IndexError> {
        if self.x <= 0 || self.y <= 0 || self.z <= 0 {
            return Err(IndexError::InvalidBlockSize([self.x, self.y, self.z]));
        }
        Ok(())
    }
}

impl fmt::Display for Point3d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A chunk (block) coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkPoint3d {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkPoint3d {
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Coordinates in traversal order, most significant first.
    #[inline]
    pub const fn zyx(&self) -> (i32, i32, i32) {
        (self.z, self.y, self.x)
    }
}

impl fmt::Display for ChunkPoint3d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk({}, {}, {})", self.x, self.y, self.z)
    }
}

/// An axis-aligned box in voxel space: `offset` plus `size` voxels per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subvolume {
    pub offset: Point3d,
    pub size: Point3d,
}

impl Subvolume {
    pub fn new(offset: Point3d, size: Point3d) -> Self {
        Self { offset, size }
    }

    /// First voxel of the box.
    #[inline]
    pub fn start_point(&self) -> Point3d {
        self.offset
    }

    /// Last voxel of the box (inclusive).
    ///
    /// Fails when the box reaches past the largest addressable voxel.
    pub fn end_point(&self) -> Result<Point3d, IndexError> {
        let last = |offset: i32, size: i32| i32::try_from(offset as i64 + size as i64 - 1).ok();
        match (
            last(self.offset.x, self.size.x),
            last(self.offset.y, self.size.y),
            last(self.offset.z, self.size.z),
        ) {
            (Some(x), Some(y), Some(z)) => Ok(Point3d { x, y, z }),
            _ => Err(IndexError::GeometryOutOfRange {
                offset: [self.offset.x, self.offset.y, self.offset.z],
                size: [self.size.x, self.size.y, self.size.z],
            }),
        }
    }

    /// Number of voxels, or `None` if it does not fit in a `u64`.
    pub fn num_voxels(&self) -> Option<u64> {
        self.size.volume()
    }

    /// Every chunk intersecting the box, as inclusive chunk extents.
    pub fn chunk_extents(&self, block_size: &Point3d) -> Result<ChunkExtents, IndexError> {
        block_size.validate_block_size()?;
        if self.size.x <= 0 || self.size.y <= 0 || self.size.z <= 0 {
            return Err(IndexError::EmptyGeometry([
                self.size.x,
                self.size.y,
                self.size.z,
            ]));
        }
        Ok(ChunkExtents::new(
            self.start_point().chunk(block_size),
            self.end_point()?.chunk(block_size),
        ))
    }
}

/// An inclusive box of chunk coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkExtents {
    pub begin: ChunkPoint3d,
    pub end: ChunkPoint3d,
}

impl ChunkExtents {
    pub fn new(begin: ChunkPoint3d, end: ChunkPoint3d) -> Self {
        Self { begin, end }
    }

    /// True when some axis has `begin > end`.
    pub fn is_empty(&self) -> bool {
        self.begin.x > self.end.x || self.begin.y > self.end.y || self.begin.z > self.end.z
    }

    /// Number of chunks in the box, saturating at `u64::MAX`.
    pub fn num_chunks(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        let span = |a: i32, b: i32| (b as i64 - a as i64 + 1) as u64;
        span(self.begin.x, self.end.x)
            .saturating_mul(span(self.begin.y, self.end.y))
            .saturating_mul(span(self.begin.z, self.end.z))
    }

    pub fn contains(&self, p: &ChunkPoint3d) -> bool {
        (self.begin.x..=self.end.x).contains(&p.x)
            && (self.begin.y..=self.end.y).contains(&p.y)
            && (self.begin.z..=self.end.z).contains(&p.z)
    }
}
