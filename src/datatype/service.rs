// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The datatype plugin contract.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{DataConfig, DatatypeError};
use crate::index::{
    ChunkPoint3d, DataLocalId, DatasetLocalId, IndexBytes, IndexIter, IndexScheme, Point3d,
    SpanIter, Subvolume,
};

/// Identity of a data instance, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDescriptor {
    pub dataset: DatasetLocalId,
    pub id: DataLocalId,
    pub name: String,
    pub type_name: String,
}

/// Reply from a type-specific command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataReply {
    pub text: String,
    /// The command changed a mutable property; the owning dataset must be
    /// saved for the change to survive a restart.
    pub modified: bool,
}

impl DataReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            modified: false,
        }
    }

    pub fn modified(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            modified: true,
        }
    }
}

/// A datatype: a named constructor of data instances.
pub trait Datatype: Send + Sync {
    /// Registry name, e.g. `voxels`.
    fn name(&self) -> &'static str;

    fn url(&self) -> &'static str;

    fn version(&self) -> &'static str;

    fn help(&self) -> String;

    /// Builds a new instance from user settings.
    fn new_data(
        &self,
        descriptor: DataDescriptor,
        config: &DataConfig,
    ) -> Result<Arc<dyn DataService>, DatatypeError>;

    /// Rebuilds an instance from the blob its [`DataService::config_json`]
    /// produced.
    fn restore(
        &self,
        descriptor: DataDescriptor,
        config: serde_json::Value,
    ) -> Result<Arc<dyn DataService>, DatatypeError>;
}

/// One data instance: index generation and chunk serialization for its
/// chunks.
///
/// Instances without channels accept only channel 0.
pub trait DataService: Send + Sync + fmt::Debug {
    fn descriptor(&self) -> &DataDescriptor;

    fn help(&self) -> String;

    /// Chunk dimensions in voxels.
    fn block_size(&self) -> Point3d;

    /// Index encoding for one channel.
    fn index_scheme(&self, channel: u32) -> Result<IndexScheme, DatatypeError>;

    /// Size of a decoded chunk of `channel`, in bytes.
    fn chunk_bytes(&self, channel: u32) -> Result<usize, DatatypeError>;

    /// Encodes decoded chunk bytes into a stored payload.
    fn serialize_chunk(&self, channel: u32, voxels: &[u8]) -> Result<Vec<u8>, DatatypeError>;

    /// Decodes a stored payload.
    fn deserialize_chunk(&self, channel: u32, payload: &[u8]) -> Result<Vec<u8>, DatatypeError>;

    /// The persisted configuration blob.
    fn config_json(&self) -> Result<serde_json::Value, DatatypeError>;

    /// Runs a type-specific command.
    fn do_rpc(&self, command: &[String], _config: &DataConfig) -> Result<DataReply, DatatypeError> {
        Err(DatatypeError::UnknownCommand(command.join(" ")))
    }

    fn as_any(&self) -> &dyn Any;

    fn index(&self, channel: u32, point: ChunkPoint3d) -> Result<IndexBytes, DatatypeError> {
        Ok(self.index_scheme(channel)?.encode(point))
    }

    /// Indices of every chunk intersecting `geometry`, in key order.
    fn index_iterator(&self, channel: u32, geometry: &Subvolume) -> Result<IndexIter, DatatypeError> {
        let extents = geometry.chunk_extents(&self.block_size())?;
        Ok(IndexIter::new(self.index_scheme(channel)?, extents))
    }

    /// Contiguous index spans covering `geometry`, one per chunk row.
    fn span_iterator(&self, channel: u32, geometry: &Subvolume) -> Result<SpanIter, DatatypeError> {
        let extents = geometry.chunk_extents(&self.block_size())?;
        Ok(SpanIter::new(self.index_scheme(channel)?, extents))
    }
}

impl dyn DataService {
    pub fn name(&self) -> &str {
        &self.descriptor().name
    }

    pub fn type_name(&self) -> &str {
        &self.descriptor().type_name
    }

    pub fn downcast_ref<T: DataService + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}
