// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The running datastore: dataset registry, version resolution, and the
//! chunk read/write paths.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use super::codec::{self, RecordKind};
use super::config::DatastoreConfig;
use super::dataset::{dag_key, dataset_key, Dataset, DatasetRecord, RegistryRecord, REGISTRY_KEY};
use super::DatastoreError;
use crate::dag::{DagRecord, Node, VersionDag, VersionUuid};
use crate::datatype::{DataConfig, DataService, TypeRegistry};
use crate::index::{
    build_key, decode_key, meta_key, prefix_range, span_range, version_prefix, ChunkPoint3d,
    DataLocalId, DatasetLocalId, Subvolume, VersionLocalId,
};
use crate::storage::{BulkLoad, Key, KeyValueStore, Value, WriteBatch};

/// A version resolved to the ids its chunk keys are built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRef {
    pub uuid: VersionUuid,
    pub dataset: DatasetLocalId,
    pub version: VersionLocalId,
}

struct Registry {
    next_id: DatasetLocalId,
    datasets: BTreeMap<DatasetLocalId, Arc<Dataset>>,
}

impl Registry {
    fn to_record(&self) -> RegistryRecord {
        RegistryRecord {
            next_dataset_id: self.next_id,
            datasets: self.datasets.keys().copied().collect(),
        }
    }
}

#[derive(Serialize)]
struct DataInfo<'a> {
    name: &'a str,
    type_name: &'a str,
    id: DataLocalId,
    config: serde_json::Value,
}

#[derive(Serialize)]
struct DatasetInfo<'a> {
    id: DatasetLocalId,
    root: VersionUuid,
    next_version_id: VersionLocalId,
    versions: Vec<Node>,
    data: Vec<DataInfo<'a>>,
}

/// A versioned datastore over one storage engine.
///
/// Every operation is safe to call from many threads at once. There is no
/// global lock: the dataset table has its own lock, and each dataset guards
/// its version DAG separately.
///
/// # Example
///
/// ```
/// use voxdag::datastore::Datastore;
/// use voxdag::datatype::DataConfig;
/// use voxdag::index::ChunkPoint3d;
///
/// let store = Datastore::in_memory().unwrap();
/// let (root, _) = store.new_dataset().unwrap();
///
/// let config = DataConfig::parse(["BlockSize=2"]).unwrap();
/// store.new_data(&root, "voxels", "grayscale", &config).unwrap();
///
/// let p = ChunkPoint3d::new(0, 0, 0);
/// store.put_chunk(&root, "grayscale", 0, p, &[7u8; 8]).unwrap();
/// assert_eq!(store.get_chunk(&root, "grayscale", 0, p).unwrap(), vec![7u8; 8]);
///
/// store.lock(&root).unwrap();
/// assert!(store.put_chunk(&root, "grayscale", 0, p, &[0u8; 8]).is_err());
/// ```
pub struct Datastore {
    engine: Arc<dyn KeyValueStore>,
    types: TypeRegistry,
    registry: RwLock<Registry>,
}

impl Datastore {
    /// Opens the datastore held by `engine`, initializing an empty one if the
    /// engine holds none.
    pub fn create(engine: Arc<dyn KeyValueStore>, types: TypeRegistry) -> Result<Self, DatastoreError> {
        if engine.get(&meta_key(REGISTRY_KEY))?.is_none() {
            let record = RegistryRecord::default();
            engine.put(meta_key(REGISTRY_KEY), codec::encode(RecordKind::Registry, &record)?)?;
            info!(engine = engine.name(), "initialized empty datastore");
        }
        Self::open(engine, types)
    }

    /// Opens the datastore held by `engine`.
    pub fn open(engine: Arc<dyn KeyValueStore>, types: TypeRegistry) -> Result<Self, DatastoreError> {
        let raw = engine
            .get(&meta_key(REGISTRY_KEY))?
            .ok_or_else(|| DatastoreError::NotInitialized(engine.name().to_string()))?;
        let record: RegistryRecord = codec::decode(RecordKind::Registry, raw.as_bytes())?;

        let mut datasets = BTreeMap::new();
        for id in record.datasets {
            if id >= record.next_dataset_id {
                return Err(DatastoreError::Corrupt(format!(
                    "dataset {} at or above the next id {}",
                    id, record.next_dataset_id
                )));
            }
            let dag: DagRecord = Self::load(engine.as_ref(), &dag_key(id), RecordKind::Dag)?;
            let data: DatasetRecord =
                Self::load(engine.as_ref(), &dataset_key(id), RecordKind::Dataset)?;
            if data.id != id {
                return Err(DatastoreError::Corrupt(format!(
                    "dataset record {} stored under id {}",
                    data.id, id
                )));
            }
            datasets.insert(id, Arc::new(Dataset::from_records(dag, data, &types)?));
        }

        info!(
            engine = engine.name(),
            datasets = datasets.len(),
            "opened datastore"
        );
        Ok(Self {
            engine,
            types,
            registry: RwLock::new(Registry {
                next_id: record.next_dataset_id,
                datasets,
            }),
        })
    }

    /// Opens the configured engine with the built-in datatypes.
    pub fn open_with_config(config: &DatastoreConfig) -> Result<Self, DatastoreError> {
        let engine = config.open_engine()?;
        let types = TypeRegistry::with_builtin();
        if config.create_if_missing {
            Self::create(engine, types)
        } else {
            Self::open(engine, types)
        }
    }

    /// A fresh, empty, volatile datastore.
    pub fn in_memory() -> Result<Self, DatastoreError> {
        Self::open_with_config(&DatastoreConfig::memory())
    }

    fn load<T: serde::de::DeserializeOwned>(
        engine: &dyn KeyValueStore,
        key: &Key,
        kind: RecordKind,
    ) -> Result<T, DatastoreError> {
        let raw = engine
            .get(key)?
            .ok_or_else(|| DatastoreError::Corrupt(format!("missing {:?} record {:?}", kind, key)))?;
        codec::decode(kind, raw.as_bytes())
    }

    pub fn engine(&self) -> &dyn KeyValueStore {
        self.engine.as_ref()
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// One-line description of the datastore.
    pub fn about(&self) -> String {
        let registry = self.registry.read();
        format!(
            "voxdag {} on {} engine, {} datasets, datatypes: {}",
            env!("CARGO_PKG_VERSION"),
            self.engine.name(),
            registry.datasets.len(),
            self.types.names().collect::<Vec<_>>().join(", ")
        )
    }

    /// Creates a dataset with a fresh DAG and returns its root version and id.
    pub fn new_dataset(&self) -> Result<(VersionUuid, DatasetLocalId), DatastoreError> {
        let mut registry = self.registry.write();
        let id = registry.next_id;
        let next = id.next().ok_or(DatastoreError::IdsExhausted("dataset ids"))?;

        let dataset = Dataset::new(id);
        let root = dataset.root();

        let mut batch = WriteBatch::new();
        batch
            .put(dag_key(id), codec::encode(RecordKind::Dag, &dataset.dag().read().to_record())?)
            .put(dataset_key(id), codec::encode(RecordKind::Dataset, &dataset.to_record()?)?);

        let mut record = registry.to_record();
        record.next_dataset_id = next;
        record.datasets.push(id);
        batch.put(meta_key(REGISTRY_KEY), codec::encode(RecordKind::Registry, &record)?);
        self.engine.write_batch(batch)?;

        registry.next_id = next;
        registry.datasets.insert(id, Arc::new(dataset));

        info!(dataset = %id, %root, "created dataset");
        Ok((root, id))
    }

    /// Every dataset, ordered by id.
    pub fn datasets(&self) -> Vec<Arc<Dataset>> {
        self.registry.read().datasets.values().cloned().collect()
    }

    /// The dataset holding `uuid`, with the version's local id.
    pub fn dataset_of(&self, uuid: &VersionUuid) -> Result<(Arc<Dataset>, VersionLocalId), DatastoreError> {
        for dataset in self.registry.read().datasets.values() {
            if let Ok(version) = dataset.dag().read().local_id(uuid) {
                return Ok((Arc::clone(dataset), version));
            }
        }
        Err(DatastoreError::UnknownVersion(uuid.to_string()))
    }

    /// Resolves a uuid prefix to the single version it names.
    pub fn matching_uuid(&self, prefix: &str) -> Result<VersionUuid, DatastoreError> {
        let mut found = Vec::new();
        for dataset in self.registry.read().datasets.values() {
            found.extend(
                dataset
                    .dag()
                    .read()
                    .uuids()
                    .filter(|u| u.matches_prefix(prefix))
                    .copied(),
            );
        }
        match found.as_slice() {
            [uuid] => Ok(*uuid),
            [] => Err(DatastoreError::NoMatch(prefix.to_string())),
            _ => Err(DatastoreError::AmbiguousUuid {
                prefix: prefix.to_string(),
                matches: found.len(),
            }),
        }
    }

    /// Resolves a uuid or uuid prefix to its dataset and version ids.
    pub fn resolve_version(&self, uuid_or_prefix: &str) -> Result<VersionRef, DatastoreError> {
        let uuid = self.matching_uuid(uuid_or_prefix)?;
        let (dataset, version) = self.dataset_of(&uuid)?;
        Ok(VersionRef {
            uuid,
            dataset: dataset.id(),
            version,
        })
    }

    fn save_dag(&self, id: DatasetLocalId, record: &DagRecord) -> Result<(), DatastoreError> {
        self.engine.put(dag_key(id), codec::encode(RecordKind::Dag, record)?)?;
        Ok(())
    }

    /// Applies `change` to a copy of the dataset's DAG and installs the copy
    /// only once it is persisted. A failed write leaves the DAG untouched.
    fn update_dag<T>(
        &self,
        dataset: &Dataset,
        change: impl FnOnce(&mut VersionDag) -> Result<T, DatastoreError>,
    ) -> Result<T, DatastoreError> {
        let mut dag = dataset.dag().write();
        let mut next = dag.clone();
        let out = change(&mut next)?;
        self.save_dag(dataset.id(), &next.to_record())?;
        *dag = next;
        Ok(out)
    }

    /// Branches a new version off `parent`.
    pub fn new_version(&self, parent: &VersionUuid) -> Result<VersionUuid, DatastoreError> {
        let (dataset, _) = self.dataset_of(parent)?;
        let (child, id) = self.update_dag(&dataset, |dag| Ok(dag.new_version(parent)?))?;

        info!(dataset = %dataset.id(), %parent, %child, version_id = %id, "created version");
        Ok(child)
    }

    /// Locks a version. Locking a locked version succeeds.
    pub fn lock(&self, uuid: &VersionUuid) -> Result<(), DatastoreError> {
        let (dataset, _) = self.dataset_of(uuid)?;
        let newly_locked = self.update_dag(&dataset, |dag| {
            if dag.is_locked(uuid)? {
                return Ok(false);
            }
            dag.lock(uuid)?;
            Ok(true)
        })?;
        if !newly_locked {
            return Ok(());
        }

        info!(dataset = %dataset.id(), %uuid, "locked version");
        Ok(())
    }

    pub fn is_locked(&self, uuid: &VersionUuid) -> Result<bool, DatastoreError> {
        let (dataset, _) = self.dataset_of(uuid)?;
        let locked = dataset.dag().read().is_locked(uuid)?;
        Ok(locked)
    }

    /// Sets the provenance note of a version.
    pub fn annotate(&self, uuid: &VersionUuid, note: &str) -> Result<(), DatastoreError> {
        let (dataset, _) = self.dataset_of(uuid)?;
        self.update_dag(&dataset, |dag| Ok(dag.annotate(uuid, note)?))
    }

    /// Adds a data instance to the dataset holding `uuid`.
    pub fn new_data(
        &self,
        uuid: &VersionUuid,
        type_name: &str,
        data_name: &str,
        config: &DataConfig,
    ) -> Result<Arc<dyn DataService>, DatastoreError> {
        let (dataset, _) = self.dataset_of(uuid)?;
        let datatype = self
            .types
            .get(type_name)
            .ok_or_else(|| DatastoreError::UnknownDatatype(type_name.to_string()))?;

        let service = dataset.new_data(datatype.as_ref(), data_name, config, |record| {
            self.engine
                .put(dataset_key(dataset.id()), codec::encode(RecordKind::Dataset, record)?)?;
            Ok(())
        })?;

        info!(
            dataset = %dataset.id(),
            data = data_name,
            datatype = type_name,
            data_id = %service.descriptor().id,
            "created data instance"
        );
        Ok(service)
    }

    /// Looks up a data instance by name in the dataset holding `uuid`.
    pub fn data_service_by_uuid(
        &self,
        uuid: &VersionUuid,
        data_name: &str,
    ) -> Result<Arc<dyn DataService>, DatastoreError> {
        let (dataset, _) = self.dataset_of(uuid)?;
        dataset.data(data_name)
    }

    /// Persists the data instances of the dataset holding `uuid`, e.g. after
    /// a channel count change.
    pub fn save_dataset(&self, uuid: &VersionUuid) -> Result<(), DatastoreError> {
        let (dataset, _) = self.dataset_of(uuid)?;
        let record = dataset.to_record()?;
        self.engine
            .put(dataset_key(dataset.id()), codec::encode(RecordKind::Dataset, &record)?)?;
        debug!(dataset = %dataset.id(), "saved dataset");
        Ok(())
    }

    /// JSON description of every dataset: versions and data instances.
    ///
    /// Output is a pure function of the persisted state, so it compares
    /// equal across a close and reopen.
    pub fn datasets_info_json(&self) -> Result<String, DatastoreError> {
        let datasets = self.datasets();
        let instances: Vec<Vec<Arc<dyn DataService>>> =
            datasets.iter().map(|d| d.data_instances()).collect();

        let mut info = Vec::with_capacity(datasets.len());
        for (dataset, data) in datasets.iter().zip(&instances) {
            let dag = dataset.dag().read();
            let mut data_info = Vec::with_capacity(data.len());
            for service in data {
                let descriptor = service.descriptor();
                data_info.push(DataInfo {
                    name: &descriptor.name,
                    type_name: &descriptor.type_name,
                    id: descriptor.id,
                    config: service.config_json()?,
                });
            }
            info.push(DatasetInfo {
                id: dataset.id(),
                root: dag.root(),
                next_version_id: dag.next_version_id(),
                versions: dag.nodes().cloned().collect(),
                data: data_info,
            });
        }
        Ok(serde_json::to_string_pretty(&info)?)
    }

    fn chunk_key(
        dataset: &Dataset,
        data: &dyn DataService,
        version: VersionLocalId,
        channel: u32,
        point: ChunkPoint3d,
    ) -> Result<Key, DatastoreError> {
        let index = data.index(channel, point)?;
        Ok(build_key(dataset.id(), data.descriptor().id, version, index.as_bytes()))
    }

    /// Runs `write` while holding the dataset's DAG lock shared, after
    /// checking that `uuid` is unlocked. A concurrent [`Datastore::lock`]
    /// therefore lands entirely before or entirely after the write.
    fn with_unlocked<T>(
        dataset: &Dataset,
        uuid: &VersionUuid,
        write: impl FnOnce() -> Result<T, DatastoreError>,
    ) -> Result<T, DatastoreError> {
        let dag = dataset.dag().read();
        if dag.is_locked(uuid)? {
            return Err(DatastoreError::VersionLocked(*uuid));
        }
        let out = write()?;
        drop(dag);
        Ok(out)
    }

    /// Stores one decoded chunk.
    pub fn put_chunk(
        &self,
        uuid: &VersionUuid,
        data_name: &str,
        channel: u32,
        point: ChunkPoint3d,
        voxels: &[u8],
    ) -> Result<(), DatastoreError> {
        let (dataset, version) = self.dataset_of(uuid)?;
        let data = dataset.data(data_name)?;
        let key = Self::chunk_key(&dataset, data.as_ref(), version, channel, point)?;
        let payload = Value(data.serialize_chunk(channel, voxels)?);

        Self::with_unlocked(&dataset, uuid, || {
            debug!(%uuid, data = data_name, channel, %point, bytes = payload.len(), "put chunk");
            Ok(self.engine.put(key, payload)?)
        })
    }

    /// Stores several chunks of one channel atomically.
    pub fn write_chunk_batch(
        &self,
        uuid: &VersionUuid,
        data_name: &str,
        channel: u32,
        chunks: &[(ChunkPoint3d, Vec<u8>)],
    ) -> Result<(), DatastoreError> {
        let (dataset, version) = self.dataset_of(uuid)?;
        let data = dataset.data(data_name)?;

        let mut batch = WriteBatch::new();
        for (point, voxels) in chunks {
            let key = Self::chunk_key(&dataset, data.as_ref(), version, channel, *point)?;
            batch.put(key, Value(data.serialize_chunk(channel, voxels)?));
        }

        Self::with_unlocked(&dataset, uuid, || {
            debug!(%uuid, data = data_name, channel, chunks = batch.len(), "write chunk batch");
            Ok(self.engine.write_batch(batch)?)
        })
    }

    /// Removes one chunk from a version. Removing a missing chunk succeeds.
    pub fn delete_chunk(
        &self,
        uuid: &VersionUuid,
        data_name: &str,
        channel: u32,
        point: ChunkPoint3d,
    ) -> Result<(), DatastoreError> {
        let (dataset, version) = self.dataset_of(uuid)?;
        let data = dataset.data(data_name)?;
        let key = Self::chunk_key(&dataset, data.as_ref(), version, channel, point)?;

        Self::with_unlocked(&dataset, uuid, || Ok(self.engine.delete(&key)?))
    }

    /// Removes every chunk a data instance stored directly in one version.
    pub fn delete_version_data(&self, uuid: &VersionUuid, data_name: &str) -> Result<(), DatastoreError> {
        let (dataset, version) = self.dataset_of(uuid)?;
        let data = dataset.data(data_name)?;
        let (begin, end) = prefix_range(&version_prefix(dataset.id(), data.descriptor().id, version));

        Self::with_unlocked(&dataset, uuid, || {
            info!(%uuid, data = data_name, "deleting version data");
            Ok(self.engine.delete_range(&begin, &end)?)
        })
    }

    /// Streams chunks into a version with the engine in bulk-load mode.
    ///
    /// The version's lock is checked per chunk, so a concurrent lock stops
    /// the load part way; chunks already written stay. Returns the number
    /// of chunks written.
    pub fn bulk_load<I>(
        &self,
        uuid: &VersionUuid,
        data_name: &str,
        channel: u32,
        chunks: I,
    ) -> Result<usize, DatastoreError>
    where
        I: IntoIterator<Item = (ChunkPoint3d, Vec<u8>)>,
    {
        let (dataset, version) = self.dataset_of(uuid)?;
        let data = dataset.data(data_name)?;

        let guard = BulkLoad::begin(self.engine.as_ref())?;
        let mut written = 0;
        for (point, voxels) in chunks {
            let key = Self::chunk_key(&dataset, data.as_ref(), version, channel, point)?;
            let payload = Value(data.serialize_chunk(channel, &voxels)?);
            Self::with_unlocked(&dataset, uuid, || Ok(self.engine.put(key, payload)?))?;
            written += 1;
        }
        guard.finish()?;

        info!(%uuid, data = data_name, channel, chunks = written, "bulk load complete");
        Ok(written)
    }

    /// Reads one chunk stored directly in `uuid`.
    ///
    /// Returns [`DatastoreError::NotFound`] if that version has no such chunk.
    pub fn get_chunk(
        &self,
        uuid: &VersionUuid,
        data_name: &str,
        channel: u32,
        point: ChunkPoint3d,
    ) -> Result<Vec<u8>, DatastoreError> {
        let (dataset, version) = self.dataset_of(uuid)?;
        let data = dataset.data(data_name)?;
        let key = Self::chunk_key(&dataset, data.as_ref(), version, channel, point)?;
        match self.engine.get(&key)? {
            Some(payload) => Ok(data.deserialize_chunk(channel, payload.as_bytes())?),
            None => Err(DatastoreError::NotFound),
        }
    }

    /// Reads one chunk as seen from `uuid`: the version itself first, then
    /// its ancestors breadth-first. The first version holding the chunk wins.
    pub fn get_chunk_merged(
        &self,
        uuid: &VersionUuid,
        data_name: &str,
        channel: u32,
        point: ChunkPoint3d,
    ) -> Result<Vec<u8>, DatastoreError> {
        let (dataset, _) = self.dataset_of(uuid)?;
        let data = dataset.data(data_name)?;
        let ancestors = dataset.dag().read().ancestors(uuid)?;

        let keys = ancestors
            .iter()
            .map(|v| Self::chunk_key(&dataset, data.as_ref(), *v, channel, point))
            .collect::<Result<Vec<_>, _>>()?;
        let found = self.engine.multi_get(&keys)?.into_iter().flatten().next();
        match found {
            Some(payload) => Ok(data.deserialize_chunk(channel, payload.as_bytes())?),
            None => Err(DatastoreError::NotFound),
        }
    }

    /// Every chunk stored directly in `uuid` that intersects `geometry`, in
    /// index order.
    ///
    /// Issues one range scan per chunk row.
    pub fn scan_chunks(
        &self,
        uuid: &VersionUuid,
        data_name: &str,
        channel: u32,
        geometry: &Subvolume,
    ) -> Result<Vec<(ChunkPoint3d, Vec<u8>)>, DatastoreError> {
        let (dataset, version) = self.dataset_of(uuid)?;
        let data = dataset.data(data_name)?;
        let scheme = data.index_scheme(channel)?;
        let data_id = data.descriptor().id;

        let mut out = Vec::new();
        for span in data.span_iterator(channel, geometry)? {
            let (begin, end) = span_range(dataset.id(), data_id, version, &span.begin, &span.end);
            for item in self.engine.scan(&begin, &end)? {
                let (key, payload) = item?;
                let decoded = decode_key(key.as_bytes())?;
                let point = scheme.decode(&decoded.index)?;
                out.push((point, data.deserialize_chunk(channel, payload.as_bytes())?));
            }
        }
        debug!(%uuid, data = data_name, channel, chunks = out.len(), "scanned chunks");
        Ok(out)
    }

    /// Flushes the engine. The datastore is unusable afterwards.
    pub fn shutdown(self) -> Result<(), DatastoreError> {
        self.engine.flush()?;
        info!(engine = self.engine.name(), "datastore shut down");
        Ok(())
    }
}

impl std::fmt::Debug for Datastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datastore")
            .field("engine", &self.engine.name())
            .field("types", &self.types)
            .field("datasets", &self.registry.read().datasets.len())
            .finish()
    }
}
