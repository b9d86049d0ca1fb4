// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Case-insensitive `key=value` settings passed to datatype constructors.

use std::collections::BTreeMap;
use std::str::FromStr;

use super::DatatypeError;
use crate::index::Point3d;

/// Settings for a new data instance, e.g. `BlockSize=32,32,32`.
///
/// Keys compare case-insensitively; values keep their case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataConfig {
    settings: BTreeMap<String, String>,
}

impl DataConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `key=value` tokens. Tokens without `=` are rejected.
    pub fn parse<I, S>(tokens: I) -> Result<Self, DatatypeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::new();
        for token in tokens {
            let token = token.as_ref();
            let Some((key, value)) = token.split_once('=') else {
                return Err(DatatypeError::InvalidConfig(format!(
                    "expected key=value, got {:?}",
                    token
                )));
            };
            config.set(key.trim(), value.trim());
        }
        Ok(config)
    }

    /// Sets a value, replacing any earlier one for the same key.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.settings.insert(key.to_ascii_lowercase(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Settings in key order; keys are lowercased.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.settings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parses a value with its `FromStr` impl.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>, DatatypeError> {
        self.get(key)
            .map(|raw| {
                raw.parse::<T>().map_err(|_| {
                    DatatypeError::InvalidConfig(format!("bad value for {}: {:?}", key, raw))
                })
            })
            .transpose()
    }

    /// Parses `x,y,z`; a single number means a cube.
    pub fn get_point3d(&self, key: &str) -> Result<Option<Point3d>, DatatypeError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        let bad = || DatatypeError::InvalidConfig(format!("bad point for {}: {:?}", key, raw));
        let parts = raw
            .split(',')
            .map(|p| p.trim().parse::<i32>().map_err(|_| bad()))
            .collect::<Result<Vec<_>, _>>()?;
        match *parts.as_slice() {
            [n] => Ok(Some(Point3d::cube(n))),
            [x, y, z] => Ok(Some(Point3d::new(x, y, z))),
            _ => Err(bad()),
        }
    }
}
