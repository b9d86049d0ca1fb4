// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Z-major and channel-major chunk index encodings.
//!
//! Format of [`IndexZyx`]: `[z:i32 BE'][y:i32 BE'][x:i32 BE']` (12 bytes)
//! Format of [`IndexCzyx`]: `[c:u32 BE][z][y][x]` (16 bytes)
//!
//! `BE'` is big-endian with the sign bit flipped, so byte order matches
//! signed integer order and negative chunks sort before positive ones.

use std::fmt;

use super::point::ChunkPoint3d;
use super::IndexError;

/// An encoded, fixed-width index fragment.
///
/// Ordering is byte-lexicographic, which every encoding in this module
/// arranges to equal its traversal order.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexBytes(pub Vec<u8>);

impl IndexBytes {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for IndexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndexBytes(")?;
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

impl AsRef<[u8]> for IndexBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A reversible, order-preserving, fixed-width encoding of a chunk coordinate.
pub trait Index: Sized {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Appends the encoding to `buf`.
    fn encode_into(&self, buf: &mut Vec<u8>);

    /// Decodes exactly `WIDTH` bytes.
    fn decode(bytes: &[u8]) -> Result<Self, IndexError>;

    /// Returns the encoding as an owned fragment.
    fn to_bytes(&self) -> IndexBytes {
        let mut buf = Vec::with_capacity(Self::WIDTH);
        self.encode_into(&mut buf);
        IndexBytes(buf)
    }
}

#[inline]
fn encode_i32(v: i32, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&((v as u32) ^ 0x8000_0000).to_be_bytes());
}

#[inline]
fn decode_i32(bytes: &[u8]) -> i32 {
    let raw = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    (raw ^ 0x8000_0000) as i32
}

#[inline]
fn check_width(bytes: &[u8], expected: usize) -> Result<(), IndexError> {
    if bytes.len() != expected {
        return Err(IndexError::InvalidWidth {
            expected,
            got: bytes.len(),
        });
    }
    Ok(())
}

/// Index for plain volumes: z-major, then y, then x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexZyx(pub ChunkPoint3d);

impl Index for IndexZyx {
    const WIDTH: usize = 12;

    fn encode_into(&self, buf: &mut Vec<u8>) {
        encode_i32(self.0.z, buf);
        encode_i32(self.0.y, buf);
        encode_i32(self.0.x, buf);
    }

    fn decode(bytes: &[u8]) -> Result<Self, IndexError> {
        check_width(bytes, Self::WIDTH)?;
        Ok(Self(ChunkPoint3d {
            z: decode_i32(&bytes[0..4]),
            y: decode_i32(&bytes[4..8]),
            x: decode_i32(&bytes[8..12]),
        }))
    }
}

/// Index for multichannel volumes: channel-major, then z, y, x.
///
/// Every chunk of one channel forms a contiguous key range. Chunks of
/// different channels at the same location are far apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexCzyx {
    pub channel: u32,
    pub point: ChunkPoint3d,
}

impl IndexCzyx {
    pub fn new(channel: u32, point: ChunkPoint3d) -> Self {
        Self { channel, point }
    }
}

impl Index for IndexCzyx {
    const WIDTH: usize = 16;

    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.channel.to_be_bytes());
        IndexZyx(self.point).encode_into(buf);
    }

    fn decode(bytes: &[u8]) -> Result<Self, IndexError> {
        check_width(bytes, Self::WIDTH)?;
        let channel = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let IndexZyx(point) = IndexZyx::decode(&bytes[4..])?;
        Ok(Self { channel, point })
    }
}

/// The index encoding a datatype picked for a request.
///
/// Lets callers that only hold a `dyn` datatype handle encode, decode, and
/// iterate without knowing the concrete index type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexScheme {
    /// [`IndexZyx`].
    Zyx,
    /// [`IndexCzyx`] fixed to one channel.
    Czyx { channel: u32 },
}

impl IndexScheme {
    /// Width of every index this scheme produces.
    pub fn width(&self) -> usize {
        match self {
            IndexScheme::Zyx => IndexZyx::WIDTH,
            IndexScheme::Czyx { .. } => IndexCzyx::WIDTH,
        }
    }

    pub fn encode(&self, point: ChunkPoint3d) -> IndexBytes {
        match *self {
            IndexScheme::Zyx => IndexZyx(point).to_bytes(),
            IndexScheme::Czyx { channel } => IndexCzyx::new(channel, point).to_bytes(),
        }
    }

    /// Decodes a fragment, checking that it belongs to this scheme's channel.
    pub fn decode(&self, bytes: &[u8]) -> Result<ChunkPoint3d, IndexError> {
        match *self {
            IndexScheme::Zyx => Ok(IndexZyx::decode(bytes)?.0),
            IndexScheme::Czyx { channel } => {
                let idx = IndexCzyx::decode(bytes)?;
                if idx.channel != channel {
                    return Err(IndexError::ChannelMismatch {
                        expected: channel,
                        got: idx.channel,
                    });
                }
                Ok(idx.point)
            }
        }
    }

    /// Bytes shared by every index of this scheme.
    ///
    /// Empty for [`IndexScheme::Zyx`]; the channel number for
    /// [`IndexScheme::Czyx`], which is what makes per-channel scans contiguous.
    pub fn prefix(&self) -> Vec<u8> {
        match *self {
            IndexScheme::Zyx => Vec::new(),
            IndexScheme::Czyx { channel } => channel.to_be_bytes().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zyx_roundtrip() {
        let p = ChunkPoint3d::new(-3, 7, i32::MIN);
        let bytes = IndexZyx(p).to_bytes();
        assert_eq!(bytes.len(), IndexZyx::WIDTH);
        assert_eq!(IndexZyx::decode(bytes.as_bytes()).unwrap().0, p);
    }

    #[test]
    fn test_zyx_z_is_most_significant() {
        let a = IndexZyx(ChunkPoint3d::new(100, 100, 0)).to_bytes();
        let b = IndexZyx(ChunkPoint3d::new(0, 0, 1)).to_bytes();
        assert!(a < b);
    }

    #[test]
    fn test_negative_sorts_before_positive() {
        let neg = IndexZyx(ChunkPoint3d::new(-1, 0, 0)).to_bytes();
        let zero = IndexZyx(ChunkPoint3d::new(0, 0, 0)).to_bytes();
        let pos = IndexZyx(ChunkPoint3d::new(1, 0, 0)).to_bytes();
        assert!(neg < zero && zero < pos);
    }

    #[test]
    fn test_czyx_channel_is_most_significant() {
        let c0_far = IndexCzyx::new(0, ChunkPoint3d::new(i32::MAX, i32::MAX, i32::MAX)).to_bytes();
        let c1_near = IndexCzyx::new(1, ChunkPoint3d::new(i32::MIN, i32::MIN, i32::MIN)).to_bytes();
        assert!(c0_far < c1_near);
    }

    #[test]
    fn test_decode_wrong_width() {
        assert_eq!(
            IndexZyx::decode(&[0u8; 11]),
            Err(IndexError::InvalidWidth {
                expected: 12,
                got: 11
            })
        );
        assert!(IndexCzyx::decode(&[0u8; 12]).is_err());
    }

    #[test]
    fn test_scheme_checks_channel() {
        let p = ChunkPoint3d::new(1, 2, 3);
        let encoded = IndexScheme::Czyx { channel: 2 }.encode(p);

        assert_eq!(IndexScheme::Czyx { channel: 2 }.decode(encoded.as_bytes()).unwrap(), p);
        assert_eq!(
            IndexScheme::Czyx { channel: 1 }.decode(encoded.as_bytes()),
            Err(IndexError::ChannelMismatch {
                expected: 1,
                got: 2
            })
        );
        assert!(encoded.as_bytes().starts_with(&IndexScheme::Czyx { channel: 2 }.prefix()));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn point() -> impl Strategy<Value = ChunkPoint3d> {
        (any::<i32>(), any::<i32>(), any::<i32>()).prop_map(|(x, y, z)| ChunkPoint3d::new(x, y, z))
    }

    proptest! {
        #[test]
        fn zyx_roundtrip(p in point()) {
            let bytes = IndexZyx(p).to_bytes();
            prop_assert_eq!(IndexZyx::decode(bytes.as_bytes()).unwrap().0, p);
        }

        #[test]
        fn czyx_roundtrip(c in any::<u32>(), p in point()) {
            let idx = IndexCzyx::new(c, p);
            prop_assert_eq!(IndexCzyx::decode(idx.to_bytes().as_bytes()).unwrap(), idx);
        }

        #[test]
        fn zyx_byte_order_matches_traversal_order(a in point(), b in point()) {
            let ea = IndexZyx(a).to_bytes();
            let eb = IndexZyx(b).to_bytes();
            prop_assert_eq!(a.zyx().cmp(&b.zyx()), ea.cmp(&eb));
        }

        #[test]
        fn czyx_byte_order_matches_traversal_order(
            ca in 0u32..8, a in point(),
            cb in 0u32..8, b in point(),
        ) {
            let ea = IndexCzyx::new(ca, a).to_bytes();
            let eb = IndexCzyx::new(cb, b).to_bytes();
            let ta = (ca, a.zyx());
            let tb = (cb, b.zyx());
            prop_assert_eq!(ta.cmp(&tb), ea.cmp(&eb));
        }
    }
}
