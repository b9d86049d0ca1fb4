// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Self-describing envelopes for persisted metadata records.
//!
//! Every record is stored as `{"kind": <tag>, "format": <n>, "body": ...}`.
//! Decoding checks the tag against the kind the caller expects, so a record
//! read from the wrong key fails loudly instead of half-decoding.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::DatastoreError;
use crate::storage::Value;

/// Current record format.
pub const FORMAT_VERSION: u32 = 1;

/// Tag table of every persisted record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Dataset id counter and the list of datasets.
    Registry,
    /// One dataset's data instances.
    Dataset,
    /// One dataset's version DAG.
    Dag,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    kind: RecordKind,
    format: u32,
    body: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    kind: RecordKind,
    format: u32,
    body: serde_json::Value,
}

/// Wraps `body` in an envelope of the given kind.
pub fn encode<T: Serialize>(kind: RecordKind, body: &T) -> Result<Value, DatastoreError> {
    let bytes = serde_json::to_vec(&EnvelopeRef {
        kind,
        format: FORMAT_VERSION,
        body,
    })?;
    Ok(Value(bytes))
}

/// Unwraps an envelope, checking its kind and format.
pub fn decode<T: DeserializeOwned>(kind: RecordKind, bytes: &[u8]) -> Result<T, DatastoreError> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    if envelope.kind != kind {
        return Err(DatastoreError::Corrupt(format!(
            "expected a {:?} record, found {:?}",
            kind, envelope.kind
        )));
    }
    if envelope.format != FORMAT_VERSION {
        return Err(DatastoreError::Corrupt(format!(
            "unsupported {:?} record format {}",
            kind, envelope.format
        )));
    }
    Ok(serde_json::from_value(envelope.body)?)
}
