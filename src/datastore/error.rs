// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Datastore errors.

use crate::dag::{DagError, VersionUuid};
use crate::datatype::DatatypeError;
use crate::index::IndexError;
use crate::storage::StorageError;

/// Errors returned by [`Datastore`](super::Datastore) operations.
///
/// Nothing at this level is retried. Use [`DatastoreError::is_client_error`]
/// to tell a bad request from a failing server.
#[derive(Debug, thiserror::Error)]
pub enum DatastoreError {
    #[error("unknown version: {0}")]
    UnknownVersion(String),

    #[error("invalid version uuid: {0:?}")]
    InvalidUuid(String),

    #[error("uuid prefix {prefix:?} matches {matches} versions")]
    AmbiguousUuid { prefix: String, matches: usize },

    #[error("no version matches uuid prefix {0:?}")]
    NoMatch(String),

    #[error("version {0} is locked")]
    VersionLocked(VersionUuid),

    #[error("data {0:?} already exists in this dataset")]
    DuplicateDataName(String),

    #[error("no data named {0:?} in this dataset")]
    UnknownDataInstance(String),

    #[error("unknown datatype {0:?}")]
    UnknownDatatype(String),

    #[error("not found")]
    NotFound,

    #[error("no datastore at {0}; create one first")]
    NotInitialized(String),

    #[error("id space exhausted: {0}")]
    IdsExhausted(&'static str),

    #[error("storage failure: {0}")]
    StorageFailure(#[from] StorageError),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Datatype(#[from] DatatypeError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl DatastoreError {
    /// True when the request itself was wrong; false for storage, corruption,
    /// and other server-side failures.
    pub fn is_client_error(&self) -> bool {
        match self {
            DatastoreError::UnknownVersion(_)
            | DatastoreError::InvalidUuid(_)
            | DatastoreError::AmbiguousUuid { .. }
            | DatastoreError::NoMatch(_)
            | DatastoreError::VersionLocked(_)
            | DatastoreError::DuplicateDataName(_)
            | DatastoreError::UnknownDataInstance(_)
            | DatastoreError::UnknownDatatype(_)
            | DatastoreError::NotFound
            | DatastoreError::Index(_) => true,
            DatastoreError::Datatype(e) => !matches!(e, DatatypeError::Json(_)),
            DatastoreError::NotInitialized(_)
            | DatastoreError::IdsExhausted(_)
            | DatastoreError::StorageFailure(_)
            | DatastoreError::Corrupt(_) => false,
        }
    }
}

impl From<DagError> for DatastoreError {
    fn from(e: DagError) -> Self {
        match e {
            DagError::UnknownVersion(v) => DatastoreError::UnknownVersion(v),
            DagError::InvalidUuid(s) => DatastoreError::InvalidUuid(s),
            DagError::Corrupt(msg) => DatastoreError::Corrupt(msg),
            DagError::IdsExhausted => DatastoreError::IdsExhausted("version ids"),
        }
    }
}

impl From<serde_json::Error> for DatastoreError {
    fn from(e: serde_json::Error) -> Self {
        DatastoreError::Corrupt(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_vs_server() {
        assert!(DatastoreError::NoMatch("3f".into()).is_client_error());
        assert!(DatastoreError::VersionLocked(VersionUuid::new_v4()).is_client_error());
        assert!(DatastoreError::NotFound.is_client_error());
        assert!(DatastoreError::Datatype(DatatypeError::InvalidConfig("x".into())).is_client_error());

        assert!(!DatastoreError::Corrupt("bad".into()).is_client_error());
        assert!(!DatastoreError::StorageFailure(StorageError::Io(std::io::Error::other("x"))).is_client_error());
    }

    #[test]
    fn test_from_dag_error() {
        let e: DatastoreError = DagError::UnknownVersion("abc".into()).into();
        assert!(matches!(e, DatastoreError::UnknownVersion(_)));
        let e: DatastoreError = DagError::Corrupt("cycle".into()).into();
        assert!(!e.is_client_error());
    }
}
