// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Datatype plugins.
//!
//! A [`Datatype`] is registered by name in a [`TypeRegistry`] and builds
//! [`DataService`] instances. An instance decides how its chunk coordinates
//! become index bytes and how its chunks are laid out on disk; the datastore
//! treats both as opaque.
//!
//! Shipped datatypes:
//!
//! - `voxels`: single-channel scalar volumes, z-major index
//! - `multichan16`: multichannel 16-bit volumes, channel-major index

mod config;
mod error;
mod multichan16;
mod registry;
mod service;
mod voxels;

pub use config::DataConfig;
pub use error::DatatypeError;
pub use multichan16::{Multichan16, Multichan16Type, MULTICHAN16_NAME};
pub use registry::TypeRegistry;
pub use service::{DataDescriptor, DataReply, DataService, Datatype};
pub use voxels::{ByteOrder, ValueType, VoxelConfig, Voxels, VoxelsType, FORMAT_RAW, VOXELS_NAME};
