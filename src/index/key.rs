// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Composite keys: the flat byte layout every chunk and record lives under.
//!
//! Chunk key format:
//! `[0x01][dataset:u32 BE][data:u32 BE][version:u32 BE][index...]`
//!
//! Metadata key format:
//! `[0x00][name...]`
//!
//! The leading keyspace tag keeps every metadata record below every chunk, so
//! no chunk range scan can ever return a record.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::zyx::IndexBytes;
use super::IndexError;
use crate::storage::{Key, MAX_KEY_SIZE};

/// Keyspace tag for metadata records.
pub const KEYSPACE_META: u8 = 0x00;

/// Keyspace tag for chunk payloads.
pub const KEYSPACE_CHUNK: u8 = 0x01;

/// Length of the fixed part of a chunk key, before the index.
pub const CHUNK_KEY_HEADER: usize = 1 + 4 + 4 + 4;

macro_rules! local_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub const fn new(id: u32) -> Self {
                Self(id)
            }

            #[inline]
            pub const fn get(self) -> u32 {
                self.0
            }

            /// The id after this one, or `None` when the space is exhausted.
            #[inline]
            pub fn next(self) -> Option<Self> {
                self.0.checked_add(1).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

local_id!(
    /// Compact id of a dataset, unique within a datastore.
    DatasetLocalId
);
local_id!(
    /// Compact id of a data instance, unique within its dataset.
    DataLocalId
);
local_id!(
    /// Compact id of a version, unique within its dataset's DAG.
    VersionLocalId
);

/// A decoded chunk key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkKey {
    pub dataset: DatasetLocalId,
    pub data: DataLocalId,
    pub version: VersionLocalId,
    pub index: Vec<u8>,
}

#[inline]
fn chunk_header(
    buf: &mut Vec<u8>,
    dataset: DatasetLocalId,
    data: DataLocalId,
    version: VersionLocalId,
) {
    buf.push(KEYSPACE_CHUNK);
    buf.extend_from_slice(&dataset.0.to_be_bytes());
    buf.extend_from_slice(&data.0.to_be_bytes());
    buf.extend_from_slice(&version.0.to_be_bytes());
}

/// Builds the storage key of one chunk.
pub fn build_key(
    dataset: DatasetLocalId,
    data: DataLocalId,
    version: VersionLocalId,
    index: &[u8],
) -> Key {
    let mut buf = Vec::with_capacity(CHUNK_KEY_HEADER + index.len());
    chunk_header(&mut buf, dataset, data, version);
    buf.extend_from_slice(index);
    Key(buf)
}

/// Splits a chunk key back into its parts.
pub fn decode_key(key: &[u8]) -> Result<ChunkKey, IndexError> {
    if key.len() < CHUNK_KEY_HEADER {
        return Err(IndexError::InvalidKeyEncoding(format!(
            "key too short: {} bytes",
            key.len()
        )));
    }
    if key[0] != KEYSPACE_CHUNK {
        return Err(IndexError::InvalidKeyEncoding(format!(
            "not a chunk key: keyspace tag {:#04x}",
            key[0]
        )));
    }
    let u32_at = |off: usize| u32::from_be_bytes([key[off], key[off + 1], key[off + 2], key[off + 3]]);
    Ok(ChunkKey {
        dataset: DatasetLocalId(u32_at(1)),
        data: DataLocalId(u32_at(5)),
        version: VersionLocalId(u32_at(9)),
        index: key[CHUNK_KEY_HEADER..].to_vec(),
    })
}

/// The prefix shared by every chunk of one data instance at one version.
pub fn version_prefix(
    dataset: DatasetLocalId,
    data: DataLocalId,
    version: VersionLocalId,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(CHUNK_KEY_HEADER);
    chunk_header(&mut buf, dataset, data, version);
    buf
}

/// Returns the smallest key greater than every key starting with `prefix`.
///
/// Trailing `0xff` bytes are dropped and the last remaining byte is
/// incremented. A prefix of only `0xff` bytes (or an empty one) has no such
/// key; the largest key the engines accept is returned instead.
pub fn prefix_end(prefix: &[u8]) -> Key {
    let mut end = prefix.to_vec();
    while let Some(&last) = end.last() {
        if last == 0xff {
            end.pop();
        } else {
            let n = end.len();
            end[n - 1] = last + 1;
            return Key(end);
        }
    }
    Key(vec![0xff; MAX_KEY_SIZE])
}

/// Returns `[prefix, prefix_end(prefix))`.
pub fn prefix_range(prefix: &[u8]) -> (Key, Key) {
    (Key(prefix.to_vec()), prefix_end(prefix))
}

/// Range covering every chunk of one version whose index starts with
/// `index_prefix` (e.g. one channel of a multichannel instance).
pub fn index_prefix_range(
    dataset: DatasetLocalId,
    data: DataLocalId,
    version: VersionLocalId,
    index_prefix: &[u8],
) -> (Key, Key) {
    let mut prefix = version_prefix(dataset, data, version);
    prefix.extend_from_slice(index_prefix);
    prefix_range(&prefix)
}

/// The smallest key strictly greater than `key`.
#[inline]
pub fn successor(key: &Key) -> Key {
    let mut next = key.0.clone();
    next.push(0x00);
    Key(next)
}

/// Range covering the inclusive index span `[begin, end]` of one version.
pub fn span_range(
    dataset: DatasetLocalId,
    data: DataLocalId,
    version: VersionLocalId,
    begin: &IndexBytes,
    end: &IndexBytes,
) -> (Key, Key) {
    let lo = build_key(dataset, data, version, begin.as_bytes());
    let hi = build_key(dataset, data, version, end.as_bytes());
    (lo, successor(&hi))
}

/// Key of a metadata record.
pub fn meta_key(name: &str) -> Key {
    let mut buf = Vec::with_capacity(1 + name.len());
    buf.push(KEYSPACE_META);
    buf.extend_from_slice(name.as_bytes());
    Key(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ChunkPoint3d, Index, IndexZyx};

    const DS: DatasetLocalId = DatasetLocalId(3);
    const DATA: DataLocalId = DataLocalId(7);
    const V: VersionLocalId = VersionLocalId(2);

    #[test]
    fn test_build_and_decode() {
        let idx = IndexZyx(ChunkPoint3d::new(1, -2, 3)).to_bytes();
        let key = build_key(DS, DATA, V, idx.as_bytes());

        assert_eq!(key.len(), CHUNK_KEY_HEADER + IndexZyx::WIDTH);
        assert_eq!(key.as_bytes()[0], KEYSPACE_CHUNK);

        let decoded = decode_key(key.as_bytes()).unwrap();
        assert_eq!(decoded.dataset, DS);
        assert_eq!(decoded.data, DATA);
        assert_eq!(decoded.version, V);
        assert_eq!(decoded.index, idx.into_bytes());
    }

    #[test]
    fn test_decode_rejects_meta_and_short_keys() {
        assert!(decode_key(meta_key("registry").as_bytes()).is_err());
        assert!(decode_key(&[KEYSPACE_CHUNK, 0, 0]).is_err());
    }

    #[test]
    fn test_meta_sorts_below_chunks() {
        let meta = meta_key("\u{7f}zzzz");
        let chunk = build_key(DatasetLocalId(0), DataLocalId(0), VersionLocalId(0), &[]);
        assert!(meta < chunk);
    }

    #[test]
    fn test_versions_do_not_interleave() {
        let v1_max = build_key(DS, DATA, VersionLocalId(1), &[0xff; 12]);
        let v2_min = build_key(DS, DATA, VersionLocalId(2), &[0x00; 12]);
        assert!(v1_max < v2_min);

        let (lo, hi) = prefix_range(&version_prefix(DS, DATA, VersionLocalId(1)));
        assert!(lo <= v1_max && v1_max < hi);
        assert!(v2_min >= hi);
    }

    #[test]
    fn test_prefix_end() {
        assert_eq!(prefix_end(&[0x01, 0x02]), Key(vec![0x01, 0x03]));
        assert_eq!(prefix_end(&[0x01, 0xff]), Key(vec![0x02]));
        assert_eq!(prefix_end(&[0xff, 0xff]).len(), MAX_KEY_SIZE);
        assert_eq!(prefix_end(&[]).len(), MAX_KEY_SIZE);
    }

    #[test]
    fn test_span_range_is_inclusive() {
        let b = IndexZyx(ChunkPoint3d::new(0, 0, 0)).to_bytes();
        let e = IndexZyx(ChunkPoint3d::new(4, 0, 0)).to_bytes();
        let (lo, hi) = span_range(DS, DATA, V, &b, &e);

        let last = build_key(DS, DATA, V, e.as_bytes());
        let past = build_key(DS, DATA, V, IndexZyx(ChunkPoint3d::new(5, 0, 0)).to_bytes().as_bytes());
        assert!(lo <= last && last < hi);
        assert!(past >= hi);
    }

    #[test]
    fn test_local_id_next() {
        assert_eq!(VersionLocalId(1).next(), Some(VersionLocalId(2)));
        assert_eq!(VersionLocalId(u32::MAX).next(), None);
        assert_eq!(serde_json::to_string(&DatasetLocalId(9)).unwrap(), "9");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn key_roundtrip(
            ds in any::<u32>(), data in any::<u32>(), v in any::<u32>(),
            index in proptest::collection::vec(any::<u8>(), 0..32),
        ) {
            let key = build_key(DatasetLocalId(ds), DataLocalId(data), VersionLocalId(v), &index);
            let decoded = decode_key(key.as_bytes()).unwrap();
            prop_assert_eq!(decoded.dataset.0, ds);
            prop_assert_eq!(decoded.data.0, data);
            prop_assert_eq!(decoded.version.0, v);
            prop_assert_eq!(decoded.index, index);
        }

        #[test]
        fn prefix_range_contains_extensions(
            prefix in proptest::collection::vec(any::<u8>(), 1..16),
            suffix in proptest::collection::vec(any::<u8>(), 0..16),
        ) {
            let (lo, hi) = prefix_range(&prefix);
            let mut k = prefix.clone();
            k.extend_from_slice(&suffix);
            let k = Key(k);
            prop_assert!(lo <= k);
            prop_assert!(k < hi);
        }
    }
}
