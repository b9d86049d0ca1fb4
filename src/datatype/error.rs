// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Datatype errors.

use crate::index::IndexError;

/// Errors raised by datatype implementations.
#[derive(Debug, thiserror::Error)]
pub enum DatatypeError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("chunk holds {got} bytes, expected {expected}")]
    InvalidChunkSize { expected: usize, got: usize },

    #[error("unknown chunk format {0:#04x}")]
    UnknownFormat(u8),

    #[error("channel {channel} out of range: instance has channels 0..={max}")]
    ChannelOutOfRange { channel: u32, max: u32 },

    #[error("unsupported command: {0:?}")]
    UnknownCommand(String),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("config record: {0}")]
    Json(#[from] serde_json::Error),
}
