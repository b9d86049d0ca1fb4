// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Name-to-datatype lookup.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use super::multichan16::Multichan16Type;
use super::service::Datatype;
use super::voxels::VoxelsType;

/// The datatypes a datastore can instantiate, keyed by name.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    types: BTreeMap<&'static str, Arc<dyn Datatype>>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every datatype shipped with the crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(VoxelsType));
        registry.register(Arc::new(Multichan16Type));
        registry
    }

    /// Adds a datatype, replacing any previous one of the same name.
    pub fn register(&mut self, datatype: Arc<dyn Datatype>) -> &mut Self {
        self.types.insert(datatype.name(), datatype);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Datatype>> {
        self.types.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.types.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// A table of the supported datatypes for help output.
    pub fn chart(&self) -> String {
        let mut out = String::from("Supported datatypes:\n\n");
        let _ = writeln!(out, "    {:<15} {:<8} {}", "name", "version", "url");
        for t in self.types.values() {
            let _ = writeln!(out, "    {:<15} {:<8} {}", t.name(), t.version(), t.url());
        }
        out
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.types.keys()).finish()
    }
}
