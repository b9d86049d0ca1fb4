// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! `multichan16`: multichannel 16-bit volumes.
//!
//! Channels are stored segregated, `(c, z, y, x)`, rather than interleaved
//! inside each block, so one channel's chunks form a contiguous key range.
//! Channel 0 holds the RGBA composite of the first channels; channels
//! `1..=N` hold the 16-bit source data.
//!
//! Geometry, settings, and help come from an embedded [`Voxels`] instance;
//! only indexing and chunk sizes differ.

use std::any::Any;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::service::{DataDescriptor, DataReply, DataService, Datatype};
use super::voxels::{decode_raw, encode_raw, ValueType, VoxelConfig, Voxels};
use super::{DataConfig, DatatypeError};
use crate::index::{IndexScheme, Point3d};

pub const MULTICHAN16_NAME: &str = "multichan16";
const MULTICHAN16_URL: &str = "voxdag/datatype/multichan16";
const MULTICHAN16_VERSION: &str = "0.1";

/// Bytes per voxel of the RGBA composite in channel 0.
const COMPOSITE_VOXEL_BYTES: usize = 4;
/// Bytes per voxel of a source channel.
const CHANNEL_VOXEL_BYTES: usize = 2;

const HELP: &str = "\
multichan16: multichannel 16-bit volumes.

Channel 0 is an RGBA composite of the first channels; channels 1..=N hold the
16-bit source data. Each channel's blocks are stored contiguously.

Settings for 'dataset <UUID> new multichan16 <data name> <settings...>':

    BlockSize    block dimensions in voxels, \"x,y,z\" or one number (default 32)
    ByteOrder    little or big (default little)
    Channels     number of source channels (default 0)

Commands for 'node <UUID> <data name> <command>':

    help             this message
    info             the instance configuration as JSON
    channels         the number of source channels
    channels <n>     set the number of source channels
";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Multichan16Record {
    voxels: VoxelConfig,
    channels: u32,
}

fn default_config() -> VoxelConfig {
    VoxelConfig {
        block_size: Point3d::cube(32),
        value_type: ValueType::Uint16,
        ..VoxelConfig::default()
    }
}

/// The `multichan16` datatype.
#[derive(Debug, Default)]
pub struct Multichan16Type;

impl Datatype for Multichan16Type {
    fn name(&self) -> &'static str {
        MULTICHAN16_NAME
    }

    fn url(&self) -> &'static str {
        MULTICHAN16_URL
    }

    fn version(&self) -> &'static str {
        MULTICHAN16_VERSION
    }

    fn help(&self) -> String {
        HELP.to_string()
    }

    fn new_data(
        &self,
        descriptor: DataDescriptor,
        config: &DataConfig,
    ) -> Result<Arc<dyn DataService>, DatatypeError> {
        let voxel_config = default_config().with_settings(config)?;
        if voxel_config.value_type != ValueType::Uint16 {
            return Err(DatatypeError::InvalidConfig(format!(
                "multichan16 stores uint16 voxels, not {}",
                voxel_config.value_type
            )));
        }
        let channels = config.get_parsed::<u32>("Channels")?.unwrap_or(0);
        let inner = Voxels::new(descriptor, voxel_config)?;
        Ok(Arc::new(Multichan16::new(inner, channels)))
    }

    fn restore(
        &self,
        descriptor: DataDescriptor,
        config: serde_json::Value,
    ) -> Result<Arc<dyn DataService>, DatatypeError> {
        let record: Multichan16Record = serde_json::from_value(config)?;
        let inner = Voxels::new(descriptor, record.voxels)?;
        Ok(Arc::new(Multichan16::new(inner, record.channels)))
    }
}

/// A `multichan16` data instance.
#[derive(Debug)]
pub struct Multichan16 {
    inner: Voxels,
    channels: RwLock<u32>,
}

impl Multichan16 {
    pub fn new(inner: Voxels, channels: u32) -> Self {
        Self {
            inner,
            channels: RwLock::new(channels),
        }
    }

    /// Number of source channels, not counting the composite.
    pub fn channels(&self) -> u32 {
        *self.channels.read()
    }

    /// Changes the number of source channels. The owning dataset must be
    /// saved afterwards for the change to persist.
    pub fn set_channels(&self, channels: u32) {
        *self.channels.write() = channels;
        info!(
            data = %self.inner.descriptor().name,
            channels,
            "set channel count"
        );
    }

    fn check_channel(&self, channel: u32) -> Result<(), DatatypeError> {
        let max = self.channels();
        if channel > max {
            return Err(DatatypeError::ChannelOutOfRange { channel, max });
        }
        Ok(())
    }
}

impl DataService for Multichan16 {
    fn descriptor(&self) -> &DataDescriptor {
        self.inner.descriptor()
    }

    fn help(&self) -> String {
        HELP.to_string()
    }

    fn block_size(&self) -> Point3d {
        self.inner.block_size()
    }

    fn index_scheme(&self, channel: u32) -> Result<IndexScheme, DatatypeError> {
        self.check_channel(channel)?;
        Ok(IndexScheme::Czyx { channel })
    }

    fn chunk_bytes(&self, channel: u32) -> Result<usize, DatatypeError> {
        self.check_channel(channel)?;
        let voxels = self.inner.config().block_voxels();
        Ok(match channel {
            0 => voxels.saturating_mul(COMPOSITE_VOXEL_BYTES),
            _ => voxels.saturating_mul(CHANNEL_VOXEL_BYTES),
        })
    }

    fn serialize_chunk(&self, channel: u32, voxels: &[u8]) -> Result<Vec<u8>, DatatypeError> {
        encode_raw(self.chunk_bytes(channel)?, voxels)
    }

    fn deserialize_chunk(&self, channel: u32, payload: &[u8]) -> Result<Vec<u8>, DatatypeError> {
        decode_raw(self.chunk_bytes(channel)?, payload)
    }

    fn config_json(&self) -> Result<serde_json::Value, DatatypeError> {
        Ok(serde_json::to_value(Multichan16Record {
            voxels: *self.inner.config(),
            channels: self.channels(),
        })?)
    }

    fn do_rpc(&self, command: &[String], config: &DataConfig) -> Result<DataReply, DatatypeError> {
        match command {
            [cmd, arg] if cmd == "channels" => {
                let n = arg.parse::<u32>().map_err(|_| {
                    DatatypeError::InvalidConfig(format!("bad channel count {:?}", arg))
                })?;
                self.set_channels(n);
                let name = &self.inner.descriptor().name;
                Ok(DataReply::modified(format!("{} now has {} channels\n", name, n)))
            }
            [cmd] if cmd == "channels" => Ok(DataReply::text(format!("{}\n", self.channels()))),
            [cmd] if cmd == "info" => {
                Ok(DataReply::text(serde_json::to_string_pretty(&self.config_json()?)?))
            }
            _ => self.inner.do_rpc(command, config),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ChunkPoint3d, DataLocalId, DatasetLocalId};

    fn new_instance(settings: &[&str]) -> Arc<dyn DataService> {
        let descriptor = DataDescriptor {
            dataset: DatasetLocalId(1),
            id: DataLocalId(2),
            name: "fluoro".to_string(),
            type_name: MULTICHAN16_NAME.to_string(),
        };
        let config = DataConfig::parse(settings.iter().copied()).unwrap();
        Multichan16Type.new_data(descriptor, &config).unwrap()
    }

    #[test]
    fn test_defaults_delegate_to_voxels() {
        let data = new_instance(&[]);
        assert_eq!(data.block_size(), Point3d::cube(32));
        assert_eq!(data.chunk_bytes(0).unwrap(), 32 * 32 * 32 * 4);
        assert!(data.chunk_bytes(1).is_err());
    }

    #[test]
    fn test_channel_sizes() {
        let data = new_instance(&["blocksize=4", "channels=3"]);
        assert_eq!(data.chunk_bytes(0).unwrap(), 64 * 4);
        assert_eq!(data.chunk_bytes(3).unwrap(), 64 * 2);
        assert!(matches!(
            data.chunk_bytes(4),
            Err(DatatypeError::ChannelOutOfRange { channel: 4, max: 3 })
        ));
    }

    #[test]
    fn test_rejects_other_value_types() {
        let descriptor = DataDescriptor {
            dataset: DatasetLocalId(1),
            id: DataLocalId(2),
            name: "fluoro".to_string(),
            type_name: MULTICHAN16_NAME.to_string(),
        };
        let config = DataConfig::parse(["valuetype=uint8"]).unwrap();
        assert!(Multichan16Type.new_data(descriptor, &config).is_err());
    }

    #[test]
    fn test_channel_index_is_channel_major() {
        let data = new_instance(&["channels=2"]);
        let p = ChunkPoint3d::new(5, 5, 5);
        let c1 = data.index(1, p).unwrap();
        let c2 = data.index(2, p).unwrap();
        let c1_far = data.index(1, ChunkPoint3d::new(1000, 1000, 1000)).unwrap();
        assert!(c1 < c1_far && c1_far < c2);
    }

    #[test]
    fn test_set_channels_via_rpc_and_restore() {
        let data = new_instance(&["blocksize=8"]);
        let reply = data
            .do_rpc(&["channels".to_string(), "4".to_string()], &DataConfig::new())
            .unwrap();
        assert!(reply.modified);
        assert_eq!(data.downcast_ref::<Multichan16>().unwrap().channels(), 4);

        let restored = Multichan16Type
            .restore(data.descriptor().clone(), data.config_json().unwrap())
            .unwrap();
        assert_eq!(restored.chunk_bytes(4).unwrap(), 8 * 8 * 8 * 2);
        assert_eq!(restored.block_size(), Point3d::cube(8));
    }

    #[test]
    fn test_serialize_checks_channel_size() {
        let data = new_instance(&["blocksize=2", "channels=1"]);
        let composite = vec![0u8; 8 * 4];
        let gray = vec![0u8; 8 * 2];
        assert!(data.serialize_chunk(0, &composite).is_ok());
        assert!(data.serialize_chunk(1, &gray).is_ok());
        assert!(data.serialize_chunk(1, &composite).is_err());
    }
}
