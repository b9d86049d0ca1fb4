// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The per-dataset version DAG.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::clock::now_nanos;
use super::node::{Node, VersionUuid};
use super::DagError;
use crate::index::VersionLocalId;

/// Version id of every DAG's root.
pub const ROOT_VERSION_ID: VersionLocalId = VersionLocalId(1);

/// The persisted form of a [`VersionDag`].
///
/// Every collection is ordered, so encoding the same DAG twice gives the same
/// bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagRecord {
    pub next_version_id: VersionLocalId,
    pub version_map: BTreeMap<VersionUuid, VersionLocalId>,
    pub nodes: Vec<Node>,
}

/// All versions of one dataset.
///
/// Not internally synchronized: the owning dataset keeps it behind a
/// reader-writer lock and takes the write side to branch or lock.
#[derive(Debug, Clone)]
pub struct VersionDag {
    nodes: BTreeMap<VersionLocalId, Node>,
    version_map: HashMap<VersionUuid, VersionLocalId>,
    next_version_id: VersionLocalId,
    root: VersionUuid,
}

impl VersionDag {
    /// A DAG holding only a fresh, unlocked root.
    pub fn new() -> Self {
        let root = VersionUuid::new_v4();
        let mut nodes = BTreeMap::new();
        nodes.insert(
            ROOT_VERSION_ID,
            Node::new(ROOT_VERSION_ID, root, Vec::new(), now_nanos()),
        );
        let mut version_map = HashMap::new();
        version_map.insert(root, ROOT_VERSION_ID);

        Self {
            nodes,
            version_map,
            next_version_id: VersionLocalId(ROOT_VERSION_ID.0 + 1),
            root,
        }
    }

    pub fn root(&self) -> VersionUuid {
        self.root
    }

    /// Number of versions.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false; a DAG has at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The id the next branch will receive.
    pub fn next_version_id(&self) -> VersionLocalId {
        self.next_version_id
    }

    pub fn contains(&self, uuid: &VersionUuid) -> bool {
        self.version_map.contains_key(uuid)
    }

    pub fn node(&self, uuid: &VersionUuid) -> Result<&Node, DagError> {
        let id = self.local_id(uuid)?;
        self.nodes
            .get(&id)
            .ok_or_else(|| DagError::UnknownVersion(uuid.to_string()))
    }

    fn node_mut(&mut self, uuid: &VersionUuid) -> Result<&mut Node, DagError> {
        let id = self.local_id(uuid)?;
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| DagError::UnknownVersion(uuid.to_string()))
    }

    /// Maps a version to its dataset-local id.
    pub fn local_id(&self, uuid: &VersionUuid) -> Result<VersionLocalId, DagError> {
        self.version_map
            .get(uuid)
            .copied()
            .ok_or_else(|| DagError::UnknownVersion(uuid.to_string()))
    }

    /// Every version, ordered by local id.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Every version id, in no particular order.
    pub fn uuids(&self) -> impl Iterator<Item = &VersionUuid> {
        self.version_map.keys()
    }

    /// Creates a child of `parent` and returns its uuid and local id.
    ///
    /// The parent need not be locked, and may already have children.
    pub fn new_version(
        &mut self,
        parent: &VersionUuid,
    ) -> Result<(VersionUuid, VersionLocalId), DagError> {
        self.local_id(parent)?;
        let id = self.next_version_id;
        let next = id.next().ok_or(DagError::IdsExhausted)?;

        let mut uuid = VersionUuid::new_v4();
        while self.version_map.contains_key(&uuid) {
            uuid = VersionUuid::new_v4();
        }

        self.node_mut(parent)?.children.push(uuid);
        self.nodes
            .insert(id, Node::new(id, uuid, vec![*parent], now_nanos()));
        self.version_map.insert(uuid, id);
        self.next_version_id = next;

        debug!(%parent, child = %uuid, version_id = %id, "branched version");
        Ok((uuid, id))
    }

    /// Marks a version immutable. Locking a locked version is a no-op.
    pub fn lock(&mut self, uuid: &VersionUuid) -> Result<(), DagError> {
        self.node_mut(uuid)?.locked = true;
        Ok(())
    }

    pub fn is_locked(&self, uuid: &VersionUuid) -> Result<bool, DagError> {
        Ok(self.node(uuid)?.locked)
    }

    /// Sets the free-form provenance note of a version.
    pub fn annotate(&mut self, uuid: &VersionUuid, note: impl Into<String>) -> Result<(), DagError> {
        self.node_mut(uuid)?.note = note.into();
        Ok(())
    }

    pub fn parents(&self, uuid: &VersionUuid) -> Result<&[VersionUuid], DagError> {
        Ok(&self.node(uuid)?.parents)
    }

    pub fn children(&self, uuid: &VersionUuid) -> Result<&[VersionUuid], DagError> {
        Ok(&self.node(uuid)?.children)
    }

    /// The version itself, then its ancestors breadth-first, first parent
    /// first. This is the lookup order for reads that merge across history.
    pub fn ancestors(&self, uuid: &VersionUuid) -> Result<Vec<VersionLocalId>, DagError> {
        let start = self.node(uuid)?;
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([start]);
        seen.insert(start.version_id);

        while let Some(node) = queue.pop_front() {
            order.push(node.version_id);
            for parent in &node.parents {
                let p = self.node(parent)?;
                if seen.insert(p.version_id) {
                    queue.push_back(p);
                }
            }
        }
        Ok(order)
    }

    /// Checks the structural invariants: a single root, parents that exist
    /// and were created earlier (so no cycles), matching child links, and a
    /// version map consistent with the nodes.
    pub fn validate(&self) -> Result<(), DagError> {
        let corrupt = |msg: String| Err(DagError::Corrupt(msg));

        if self.version_map.len() != self.nodes.len() {
            return corrupt(format!(
                "version map has {} entries but there are {} nodes",
                self.version_map.len(),
                self.nodes.len()
            ));
        }

        let mut roots = 0;
        for (id, node) in &self.nodes {
            if *id != node.version_id {
                return corrupt(format!("node {} stored under id {}", node.version_id, id));
            }
            if self.version_map.get(&node.uuid) != Some(id) {
                return corrupt(format!("version map disagrees for {}", node.uuid));
            }
            if node.version_id >= self.next_version_id {
                return corrupt(format!(
                    "node {} is not below the next id {}",
                    node.version_id, self.next_version_id
                ));
            }
            if node.is_root() {
                roots += 1;
                if node.uuid != self.root {
                    return corrupt(format!("unexpected root {}", node.uuid));
                }
            }
            for parent in &node.parents {
                let Some(p) = self.version_map.get(parent).and_then(|id| self.nodes.get(id)) else {
                    return corrupt(format!("{} has missing parent {}", node.uuid, parent));
                };
                if p.version_id >= node.version_id {
                    return corrupt(format!("{} is not older than its child {}", p.uuid, node.uuid));
                }
                if !p.children.contains(&node.uuid) {
                    return corrupt(format!("{} does not list child {}", p.uuid, node.uuid));
                }
            }
            for child in &node.children {
                if !self.version_map.contains_key(child) {
                    return corrupt(format!("{} has missing child {}", node.uuid, child));
                }
            }
        }
        if roots != 1 {
            return corrupt(format!("expected exactly one root, found {}", roots));
        }
        Ok(())
    }

    /// Captures the whole DAG as a self-contained record.
    pub fn to_record(&self) -> DagRecord {
        DagRecord {
            next_version_id: self.next_version_id,
            version_map: self.version_map.iter().map(|(u, id)| (*u, *id)).collect(),
            nodes: self.nodes.values().cloned().collect(),
        }
    }

    /// Rebuilds a DAG from a record, rejecting records that break any
    /// invariant.
    pub fn from_record(record: DagRecord) -> Result<Self, DagError> {
        let mut nodes = BTreeMap::new();
        for node in record.nodes {
            let id = node.version_id;
            if nodes.insert(id, node).is_some() {
                return Err(DagError::Corrupt(format!("duplicate version id {}", id)));
            }
        }
        let roots: Vec<VersionUuid> = nodes
            .values()
            .filter(|n| n.is_root())
            .map(|n| n.uuid)
            .collect();
        let [root] = roots.as_slice() else {
            return Err(DagError::Corrupt(format!(
                "expected exactly one root, found {}",
                roots.len()
            )));
        };

        let dag = Self {
            nodes,
            version_map: record.version_map.into_iter().collect(),
            next_version_id: record.next_version_id,
            root: *root,
        };
        dag.validate()?;
        Ok(dag)
    }
}

impl Default for VersionDag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_dag() {
        let dag = VersionDag::new();
        assert_eq!(dag.len(), 1);
        assert_eq!(dag.next_version_id(), VersionLocalId(2));
        assert_eq!(dag.local_id(&dag.root()).unwrap(), ROOT_VERSION_ID);
        assert!(!dag.is_locked(&dag.root()).unwrap());
        dag.validate().unwrap();
    }

    #[test]
    fn test_branching() {
        let mut dag = VersionDag::new();
        let root = dag.root();

        let (a, a_id) = dag.new_version(&root).unwrap();
        let (b, b_id) = dag.new_version(&root).unwrap();
        assert_eq!(a_id, VersionLocalId(2));
        assert_eq!(b_id, VersionLocalId(3));
        assert_ne!(a, b);

        assert_eq!(dag.children(&root).unwrap(), &[a, b]);
        assert_eq!(dag.parents(&a).unwrap(), &[root]);
        assert!(dag.parents(&root).unwrap().is_empty());
        dag.validate().unwrap();
    }

    #[test]
    fn test_unknown_version() {
        let mut dag = VersionDag::new();
        let stranger = VersionUuid::new_v4();
        assert!(matches!(dag.new_version(&stranger), Err(DagError::UnknownVersion(_))));
        assert!(matches!(dag.lock(&stranger), Err(DagError::UnknownVersion(_))));
        assert!(dag.is_locked(&stranger).is_err());
    }

    #[test]
    fn test_lock_idempotent() {
        let mut dag = VersionDag::new();
        let root = dag.root();
        dag.lock(&root).unwrap();
        dag.lock(&root).unwrap();
        assert!(dag.is_locked(&root).unwrap());

        // Locked parents can still branch.
        let (child, _) = dag.new_version(&root).unwrap();
        assert!(!dag.is_locked(&child).unwrap());
    }

    #[test]
    fn test_ancestors_bfs() {
        let mut dag = VersionDag::new();
        let root = dag.root();
        let (a, a_id) = dag.new_version(&root).unwrap();
        let (b, b_id) = dag.new_version(&a).unwrap();

        assert_eq!(dag.ancestors(&b).unwrap(), vec![b_id, a_id, ROOT_VERSION_ID]);
        assert_eq!(dag.ancestors(&root).unwrap(), vec![ROOT_VERSION_ID]);
    }

    #[test]
    fn test_record_roundtrip_byte_identical() {
        let mut dag = VersionDag::new();
        let root = dag.root();
        dag.lock(&root).unwrap();
        let (a, _) = dag.new_version(&root).unwrap();
        dag.new_version(&root).unwrap();
        dag.lock(&a).unwrap();
        dag.new_version(&a).unwrap();
        dag.annotate(&a, "segmentation pass 1").unwrap();

        let bytes = serde_json::to_vec(&dag.to_record()).unwrap();
        let record: DagRecord = serde_json::from_slice(&bytes).unwrap();
        let reloaded = VersionDag::from_record(record).unwrap();
        let again = serde_json::to_vec(&reloaded.to_record()).unwrap();

        assert_eq!(bytes, again);
        assert_eq!(reloaded.root(), root);
        assert!(reloaded.is_locked(&a).unwrap());
        assert_eq!(reloaded.node(&a).unwrap().note, "segmentation pass 1");
        assert_eq!(reloaded.next_version_id(), dag.next_version_id());
    }

    #[test]
    fn test_from_record_rejects_corruption() {
        let mut dag = VersionDag::new();
        let root = dag.root();
        dag.new_version(&root).unwrap();

        let mut missing_parent = dag.to_record();
        missing_parent.nodes[1].parents = vec![VersionUuid::new_v4()];
        assert!(matches!(
            VersionDag::from_record(missing_parent),
            Err(DagError::Corrupt(_))
        ));

        let mut two_roots = dag.to_record();
        two_roots.nodes[1].parents.clear();
        assert!(VersionDag::from_record(two_roots).is_err());

        let mut stale_counter = dag.to_record();
        stale_counter.next_version_id = VersionLocalId(2);
        assert!(VersionDag::from_record(stale_counter).is_err());

        let mut short_map = dag.to_record();
        short_map.version_map.remove(&root);
        assert!(VersionDag::from_record(short_map).is_err());
    }

    #[test]
    fn test_ids_never_reused() {
        let mut dag = VersionDag::new();
        let mut parent = dag.root();
        let mut seen = HashSet::from([ROOT_VERSION_ID]);
        for _ in 0..100 {
            let (uuid, id) = dag.new_version(&parent).unwrap();
            assert!(seen.insert(id), "id {} reused", id);
            parent = uuid;
        }
    }
}
