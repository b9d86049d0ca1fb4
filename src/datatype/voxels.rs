// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! `voxels`: a single-channel volume of fixed-size scalar voxels.
//!
//! Chunks are indexed z-major and stored as one format byte followed by the
//! block's voxels in x-fastest order.

use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::service::{DataDescriptor, DataReply, DataService, Datatype};
use super::{DataConfig, DatatypeError};
use crate::index::{IndexScheme, Point3d};
use crate::storage::MAX_VALUE_SIZE;

pub const VOXELS_NAME: &str = "voxels";
const VOXELS_URL: &str = "voxdag/datatype/voxels";
const VOXELS_VERSION: &str = "0.1";

/// Payload format byte for uncompressed chunks.
pub const FORMAT_RAW: u8 = 0x01;

const HELP: &str = "\
voxels: a volume of scalar voxels stored in fixed-size blocks.

Settings for 'dataset <UUID> new voxels <data name> <settings...>':

    BlockSize    block dimensions in voxels, \"x,y,z\" or one number (default 16)
    ValueType    uint8, uint16, uint32, uint64, float32, float64 (default uint8)
    ByteOrder    little or big (default little)

Commands for 'node <UUID> <data name> <command>':

    help         this message
    info         the instance configuration as JSON
";

/// Scalar type of one voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
}

impl ValueType {
    pub fn bytes(&self) -> usize {
        match self {
            ValueType::Uint8 => 1,
            ValueType::Uint16 => 2,
            ValueType::Uint32 | ValueType::Float32 => 4,
            ValueType::Uint64 | ValueType::Float64 => 8,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ValueType::Uint8 => "uint8",
            ValueType::Uint16 => "uint16",
            ValueType::Uint32 => "uint32",
            ValueType::Uint64 => "uint64",
            ValueType::Float32 => "float32",
            ValueType::Float64 => "float64",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = DatatypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uint8" => Ok(ValueType::Uint8),
            "uint16" => Ok(ValueType::Uint16),
            "uint32" => Ok(ValueType::Uint32),
            "uint64" => Ok(ValueType::Uint64),
            "float32" => Ok(ValueType::Float32),
            "float64" => Ok(ValueType::Float64),
            _ => Err(DatatypeError::InvalidConfig(format!("unknown value type {:?}", s))),
        }
    }
}

/// Byte order of multi-byte voxels inside a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl FromStr for ByteOrder {
    type Err = DatatypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "little" | "le" => Ok(ByteOrder::Little),
            "big" | "be" => Ok(ByteOrder::Big),
            _ => Err(DatatypeError::InvalidConfig(format!("unknown byte order {:?}", s))),
        }
    }
}

/// Geometry and value layout of a voxel volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoxelConfig {
    pub block_size: Point3d,
    pub value_type: ValueType,
    pub byte_order: ByteOrder,
}

impl Default for VoxelConfig {
    fn default() -> Self {
        Self {
            block_size: Point3d::cube(16),
            value_type: ValueType::Uint8,
            byte_order: ByteOrder::Little,
        }
    }
}

impl VoxelConfig {
    /// Applies user settings on top of `self`.
    pub fn with_settings(mut self, config: &DataConfig) -> Result<Self, DatatypeError> {
        if let Some(block_size) = config.get_point3d("BlockSize")? {
            self.block_size = block_size;
        }
        if let Some(raw) = config.get("ValueType") {
            self.value_type = raw.parse()?;
        }
        if let Some(raw) = config.get("ByteOrder") {
            self.byte_order = raw.parse()?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Voxels in one block. Saturates for configs that fail [`validate`](Self::validate).
    pub fn block_voxels(&self) -> usize {
        self.block_size
            .volume()
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(usize::MAX)
    }

    /// Bytes in one decoded block.
    pub fn block_bytes(&self) -> usize {
        self.block_voxels().saturating_mul(self.value_type.bytes())
    }

    pub fn validate(&self) -> Result<(), DatatypeError> {
        self.block_size.validate_block_size()?;
        let bytes = self
            .block_size
            .volume()
            .and_then(|v| v.checked_mul(self.value_type.bytes() as u64));
        match bytes {
            Some(bytes) if bytes < MAX_VALUE_SIZE as u64 => Ok(()),
            _ => Err(DatatypeError::InvalidConfig(format!(
                "block size {} exceeds the value size limit",
                self.block_size
            ))),
        }
    }
}

/// Prepends the raw format byte after checking the size.
pub(crate) fn encode_raw(expected: usize, voxels: &[u8]) -> Result<Vec<u8>, DatatypeError> {
    if voxels.len() != expected {
        return Err(DatatypeError::InvalidChunkSize {
            expected,
            got: voxels.len(),
        });
    }
    let mut payload = Vec::with_capacity(1 + voxels.len());
    payload.push(FORMAT_RAW);
    payload.extend_from_slice(voxels);
    Ok(payload)
}

/// Strips and checks the format byte.
pub(crate) fn decode_raw(expected: usize, payload: &[u8]) -> Result<Vec<u8>, DatatypeError> {
    let Some((&format, voxels)) = payload.split_first() else {
        return Err(DatatypeError::InvalidChunkSize {
            expected: expected + 1,
            got: 0,
        });
    };
    if format != FORMAT_RAW {
        return Err(DatatypeError::UnknownFormat(format));
    }
    if voxels.len() != expected {
        return Err(DatatypeError::InvalidChunkSize {
            expected,
            got: voxels.len(),
        });
    }
    Ok(voxels.to_vec())
}

/// The `voxels` datatype.
#[derive(Debug, Default)]
pub struct VoxelsType;

impl Datatype for VoxelsType {
    fn name(&self) -> &'static str {
        VOXELS_NAME
    }

    fn url(&self) -> &'static str {
        VOXELS_URL
    }

    fn version(&self) -> &'static str {
        VOXELS_VERSION
    }

    fn help(&self) -> String {
        HELP.to_string()
    }

    fn new_data(
        &self,
        descriptor: DataDescriptor,
        config: &DataConfig,
    ) -> Result<Arc<dyn DataService>, DatatypeError> {
        let config = VoxelConfig::default().with_settings(config)?;
        Ok(Arc::new(Voxels::new(descriptor, config)?))
    }

    fn restore(
        &self,
        descriptor: DataDescriptor,
        config: serde_json::Value,
    ) -> Result<Arc<dyn DataService>, DatatypeError> {
        let config: VoxelConfig = serde_json::from_value(config)?;
        Ok(Arc::new(Voxels::new(descriptor, config)?))
    }
}

/// A `voxels` data instance.
#[derive(Debug, Clone)]
pub struct Voxels {
    descriptor: DataDescriptor,
    config: VoxelConfig,
}

impl Voxels {
    pub fn new(descriptor: DataDescriptor, config: VoxelConfig) -> Result<Self, DatatypeError> {
        config.validate()?;
        Ok(Self { descriptor, config })
    }

    pub fn config(&self) -> &VoxelConfig {
        &self.config
    }

    fn check_channel(channel: u32) -> Result<(), DatatypeError> {
        if channel != 0 {
            return Err(DatatypeError::ChannelOutOfRange { channel, max: 0 });
        }
        Ok(())
    }
}

impl DataService for Voxels {
    fn descriptor(&self) -> &DataDescriptor {
        &self.descriptor
    }

    fn help(&self) -> String {
        HELP.to_string()
    }

    fn block_size(&self) -> Point3d {
        self.config.block_size
    }

    fn index_scheme(&self, channel: u32) -> Result<IndexScheme, DatatypeError> {
        Self::check_channel(channel)?;
        Ok(IndexScheme::Zyx)
    }

    fn chunk_bytes(&self, channel: u32) -> Result<usize, DatatypeError> {
        Self::check_channel(channel)?;
        Ok(self.config.block_bytes())
    }

    fn serialize_chunk(&self, channel: u32, voxels: &[u8]) -> Result<Vec<u8>, DatatypeError> {
        encode_raw(self.chunk_bytes(channel)?, voxels)
    }

    fn deserialize_chunk(&self, channel: u32, payload: &[u8]) -> Result<Vec<u8>, DatatypeError> {
        decode_raw(self.chunk_bytes(channel)?, payload)
    }

    fn config_json(&self) -> Result<serde_json::Value, DatatypeError> {
        Ok(serde_json::to_value(self.config)?)
    }

    fn do_rpc(&self, command: &[String], _config: &DataConfig) -> Result<DataReply, DatatypeError> {
        match command.first().map(String::as_str) {
            Some("info") => Ok(DataReply::text(serde_json::to_string_pretty(&self.config)?)),
            _ => Err(DatatypeError::UnknownCommand(command.join(" "))),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
