// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Datasets, their data instances, and the records they persist as.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::DatastoreError;
use crate::dag::{DagRecord, VersionDag, VersionUuid};
use crate::datatype::{DataConfig, DataDescriptor, DataService, Datatype, TypeRegistry};
use crate::index::{DataLocalId, DatasetLocalId};
use crate::storage::Key;

/// Persisted list of datasets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RegistryRecord {
    pub next_dataset_id: DatasetLocalId,
    pub datasets: Vec<DatasetLocalId>,
}

impl Default for RegistryRecord {
    fn default() -> Self {
        Self {
            next_dataset_id: DatasetLocalId(1),
            datasets: Vec::new(),
        }
    }
}

/// Persisted form of one data instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct DataRecord {
    pub id: DataLocalId,
    pub name: String,
    pub type_name: String,
    pub config: serde_json::Value,
}

/// Persisted data instances of one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct DatasetRecord {
    pub id: DatasetLocalId,
    pub next_data_id: DataLocalId,
    pub data: Vec<DataRecord>,
}

pub(crate) const REGISTRY_KEY: &str = "registry";

pub(crate) fn dataset_key(id: DatasetLocalId) -> Key {
    crate::index::meta_key(&format!("dataset/{:010}", id.0))
}

pub(crate) fn dag_key(id: DatasetLocalId) -> Key {
    crate::index::meta_key(&format!("dag/{:010}", id.0))
}

struct DataInstances {
    next_id: DataLocalId,
    by_name: BTreeMap<String, Arc<dyn DataService>>,
}

/// One dataset: a version DAG plus named data instances.
///
/// The DAG lock doubles as the write gate for the dataset's versions: chunk
/// writes hold it shared across the lock check and the engine write, while
/// branching and locking hold it exclusively.
pub struct Dataset {
    id: DatasetLocalId,
    dag: RwLock<VersionDag>,
    data: RwLock<DataInstances>,
}

impl Dataset {
    pub(crate) fn new(id: DatasetLocalId) -> Self {
        Self {
            id,
            dag: RwLock::new(VersionDag::new()),
            data: RwLock::new(DataInstances {
                next_id: DataLocalId(1),
                by_name: BTreeMap::new(),
            }),
        }
    }

    /// Rebuilds a dataset from its persisted records.
    pub(crate) fn from_records(
        dag: DagRecord,
        record: DatasetRecord,
        types: &TypeRegistry,
    ) -> Result<Self, DatastoreError> {
        let dag = VersionDag::from_record(dag)?;
        let mut by_name = BTreeMap::new();
        let mut ids = HashSet::new();
        for data in record.data {
            if by_name.contains_key(&data.name) || !ids.insert(data.id) {
                return Err(DatastoreError::Corrupt(format!(
                    "dataset {} holds data {:?} (id {}) twice",
                    record.id, data.name, data.id
                )));
            }
            let datatype = types
                .get(&data.type_name)
                .ok_or_else(|| DatastoreError::UnknownDatatype(data.type_name.clone()))?;
            if data.id >= record.next_data_id {
                return Err(DatastoreError::Corrupt(format!(
                    "data {:?} has id {} at or above the next id {}",
                    data.name, data.id, record.next_data_id
                )));
            }
            let descriptor = DataDescriptor {
                dataset: record.id,
                id: data.id,
                name: data.name.clone(),
                type_name: data.type_name,
            };
            let service = datatype.restore(descriptor, data.config)?;
            by_name.insert(data.name, service);
        }
        Ok(Self {
            id: record.id,
            dag: RwLock::new(dag),
            data: RwLock::new(DataInstances {
                next_id: record.next_data_id,
                by_name,
            }),
        })
    }

    pub fn id(&self) -> DatasetLocalId {
        self.id
    }

    pub fn root(&self) -> VersionUuid {
        self.dag.read().root()
    }

    /// The dataset's version DAG behind its reader-writer lock.
    pub fn dag(&self) -> &RwLock<VersionDag> {
        &self.dag
    }

    pub fn data(&self, name: &str) -> Result<Arc<dyn DataService>, DatastoreError> {
        self.data
            .read()
            .by_name
            .get(name)
            .cloned()
            .ok_or_else(|| DatastoreError::UnknownDataInstance(name.to_string()))
    }

    /// Every data instance, ordered by name.
    pub fn data_instances(&self) -> Vec<Arc<dyn DataService>> {
        self.data.read().by_name.values().cloned().collect()
    }

    /// Creates a data instance and hands the updated dataset record to
    /// `persist`. The instance is registered only if `persist` succeeds.
    pub(crate) fn new_data(
        &self,
        datatype: &dyn Datatype,
        name: &str,
        config: &DataConfig,
        persist: impl FnOnce(&DatasetRecord) -> Result<(), DatastoreError>,
    ) -> Result<Arc<dyn DataService>, DatastoreError> {
        let mut data = self.data.write();
        if data.by_name.contains_key(name) {
            return Err(DatastoreError::DuplicateDataName(name.to_string()));
        }
        let id = data.next_id;
        let next = id.next().ok_or(DatastoreError::IdsExhausted("data ids"))?;

        let descriptor = DataDescriptor {
            dataset: self.id,
            id,
            name: name.to_string(),
            type_name: datatype.name().to_string(),
        };
        let service = datatype.new_data(descriptor, config)?;

        // Tentative until persisted; the write guard hides it from readers.
        data.by_name.insert(name.to_string(), Arc::clone(&service));
        let saved = Self::record_of(self.id, next, &data.by_name).and_then(|r| persist(&r));
        if let Err(e) = saved {
            data.by_name.remove(name);
            return Err(e);
        }
        data.next_id = next;
        Ok(service)
    }

    pub(crate) fn to_record(&self) -> Result<DatasetRecord, DatastoreError> {
        let data = self.data.read();
        Self::record_of(self.id, data.next_id, &data.by_name)
    }

    fn record_of(
        id: DatasetLocalId,
        next_data_id: DataLocalId,
        by_name: &BTreeMap<String, Arc<dyn DataService>>,
    ) -> Result<DatasetRecord, DatastoreError> {
        let mut records = Vec::with_capacity(by_name.len());
        for service in by_name.values() {
            let descriptor = service.descriptor();
            records.push(DataRecord {
                id: descriptor.id,
                name: descriptor.name.clone(),
                type_name: descriptor.type_name.clone(),
                config: service.config_json()?,
            });
        }
        Ok(DatasetRecord {
            id,
            next_data_id,
            data: records,
        })
    }
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("id", &self.id)
            .field("versions", &self.dag.read().len())
            .field("data", &self.data.read().by_name.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keep(_: &DatasetRecord) -> Result<(), DatastoreError> {
        Ok(())
    }

    #[test]
    fn test_new_data_assigns_ids() {
        let types = TypeRegistry::with_builtin();
        let voxels = types.get("voxels").unwrap();
        let dataset = Dataset::new(DatasetLocalId(1));

        let a = dataset.new_data(voxels.as_ref(), "a", &DataConfig::new(), keep).unwrap();
        let mut saved = None;
        let b = dataset
            .new_data(voxels.as_ref(), "b", &DataConfig::new(), |r| {
                saved = Some(r.clone());
                Ok(())
            })
            .unwrap();
        let record = saved.unwrap();
        assert_eq!(a.descriptor().id, DataLocalId(1));
        assert_eq!(b.descriptor().id, DataLocalId(2));
        assert_eq!(record.next_data_id, DataLocalId(3));
        assert_eq!(record.data.len(), 2);
        assert_eq!(record, dataset.to_record().unwrap());

        assert!(matches!(
            dataset.new_data(voxels.as_ref(), "a", &DataConfig::new(), keep),
            Err(DatastoreError::DuplicateDataName(_))
        ));
        assert!(matches!(
            dataset.data("c"),
            Err(DatastoreError::UnknownDataInstance(_))
        ));
    }

    #[test]
    fn test_new_data_not_registered_when_persist_fails() {
        let types = TypeRegistry::with_builtin();
        let voxels = types.get("voxels").unwrap();
        let dataset = Dataset::new(DatasetLocalId(1));

        let failed = dataset.new_data(voxels.as_ref(), "gray", &DataConfig::new(), |_| {
            Err(DatastoreError::Corrupt("write refused".into()))
        });
        assert!(matches!(failed, Err(DatastoreError::Corrupt(_))));
        assert!(matches!(
            dataset.data("gray"),
            Err(DatastoreError::UnknownDataInstance(_))
        ));
        assert_eq!(dataset.to_record().unwrap().next_data_id, DataLocalId(1));

        let gray = dataset.new_data(voxels.as_ref(), "gray", &DataConfig::new(), keep).unwrap();
        assert_eq!(gray.descriptor().id, DataLocalId(1));
    }

    #[test]
    fn test_from_records_rejects_duplicates() {
        let types = TypeRegistry::with_builtin();
        let voxels = types.get("voxels").unwrap();
        let dataset = Dataset::new(DatasetLocalId(1));
        dataset.new_data(voxels.as_ref(), "a", &DataConfig::new(), keep).unwrap();
        dataset.new_data(voxels.as_ref(), "b", &DataConfig::new(), keep).unwrap();
        let dag = dataset.dag().read().to_record();

        let mut same_name = dataset.to_record().unwrap();
        same_name.data[1].name = "a".to_string();
        assert!(matches!(
            Dataset::from_records(dag.clone(), same_name, &types),
            Err(DatastoreError::Corrupt(_))
        ));

        let mut same_id = dataset.to_record().unwrap();
        same_id.data[1].id = same_id.data[0].id;
        assert!(matches!(
            Dataset::from_records(dag, same_id, &types),
            Err(DatastoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_from_records() {
        let types = TypeRegistry::with_builtin();
        let dataset = Dataset::new(DatasetLocalId(4));
        let multichan = types.get("multichan16").unwrap();
        let config = DataConfig::parse(["channels=2"]).unwrap();
        dataset.new_data(multichan.as_ref(), "fluoro", &config, keep).unwrap();

        let dag = dataset.dag().read().to_record();
        let record = dataset.to_record().unwrap();
        let restored = Dataset::from_records(dag, record.clone(), &types).unwrap();

        assert_eq!(restored.id(), DatasetLocalId(4));
        assert_eq!(restored.root(), dataset.root());
        assert_eq!(restored.to_record().unwrap(), record);
        assert_eq!(restored.data("fluoro").unwrap().chunk_bytes(2).unwrap(), 32 * 32 * 32 * 2);
    }

    #[test]
    fn test_from_records_unknown_type() {
        let dataset = Dataset::new(DatasetLocalId(1));
        let types = TypeRegistry::with_builtin();
        dataset
            .new_data(types.get("voxels").unwrap().as_ref(), "gray", &DataConfig::new(), keep)
            .unwrap();

        let dag = dataset.dag().read().to_record();
        let record = dataset.to_record().unwrap();
        assert!(matches!(
            Dataset::from_records(dag, record, &TypeRegistry::new()),
            Err(DatastoreError::UnknownDatatype(_))
        ));
    }
}
