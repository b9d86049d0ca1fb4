// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Index and key decoding errors.

/// Errors from decoding index fragments or composite keys.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    #[error("invalid index width: expected {expected} bytes, got {got}")]
    InvalidWidth { expected: usize, got: usize },

    #[error("index belongs to channel {got}, expected channel {expected}")]
    ChannelMismatch { expected: u32, got: u32 },

    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("geometry has an empty dimension: size {0:?}")]
    EmptyGeometry([i32; 3]),

    #[error("geometry at {offset:?} of size {size:?} is past the addressable range")]
    GeometryOutOfRange { offset: [i32; 3], size: [i32; 3] },

    #[error("block size must be positive in every dimension, got {0:?}")]
    InvalidBlockSize([i32; 3]),
}
