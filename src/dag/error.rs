// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Version DAG errors.

/// Errors from version DAG operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DagError {
    #[error("unknown version: {0}")]
    UnknownVersion(String),

    #[error("invalid version uuid {0:?}: expected 32 hex characters")]
    InvalidUuid(String),

    #[error("corrupt version dag: {0}")]
    Corrupt(String),

    #[error("version id space exhausted")]
    IdsExhausted,
}
