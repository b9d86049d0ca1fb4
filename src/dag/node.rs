// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Version identifiers and DAG nodes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DagError;
use crate::index::VersionLocalId;

/// Globally unique id of a version.
///
/// Displayed and persisted as 32 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct VersionUuid(Uuid);

impl VersionUuid {
    /// A fresh random id.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// True if the hex form starts with `prefix` (case-insensitive).
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        let hex = self.to_string();
        hex.len() >= prefix.len() && hex[..prefix.len()].eq_ignore_ascii_case(prefix)
    }
}

impl From<Uuid> for VersionUuid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for VersionUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl fmt::Debug for VersionUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionUuid({})", self.0.simple())
    }
}

impl FromStr for VersionUuid {
    type Err = DagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(DagError::InvalidUuid(s.to_string()));
        }
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| DagError::InvalidUuid(s.to_string()))
    }
}

impl From<VersionUuid> for String {
    fn from(uuid: VersionUuid) -> Self {
        uuid.to_string()
    }
}

impl TryFrom<String> for VersionUuid {
    type Error = DagError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// One version in a dataset's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub version_id: VersionLocalId,
    pub uuid: VersionUuid,
    /// Empty only for the root.
    pub parents: Vec<VersionUuid>,
    pub children: Vec<VersionUuid>,
    pub locked: bool,
    /// Creation time, Unix nanoseconds.
    pub created: u64,
    #[serde(default)]
    pub note: String,
}

impl Node {
    pub(crate) fn new(
        version_id: VersionLocalId,
        uuid: VersionUuid,
        parents: Vec<VersionUuid>,
        created: u64,
    ) -> Self {
        Self {
            version_id,
            uuid,
            parents,
            children: Vec::new(),
            locked: false,
            created,
            note: String::new(),
        }
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}
