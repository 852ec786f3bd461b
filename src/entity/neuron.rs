//! The neuron cell: identity, typed payload, per-aspect locked state.

use super::{ClusterData, EdgeSet, Link, NeuronId, NeuronKind, NeuronSpec, NeuronValue};
use crate::instruction::Opcode;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A neuron: a typed, linked graph node.
///
/// Each mutable aspect (value, outgoing edges, incoming edges, cluster
/// children) sits behind its own `Arc<RwLock<_>>` so the lock manager can
/// grant `(entity, aspect)` granular access and hand out owned guards.
///
/// The snapshot methods acquire the relevant aspect lock internally and are
/// safe for read-only traversal; callers that batch several operations under
/// one acquisition go through [`LockManager`](crate::LockManager) instead and
/// use the returned guarded view.
pub struct NeuronCell {
    id: NeuronId,
    kind: NeuronKind,
    /// Opcode for instruction neurons; immutable, so outside any lock.
    opcode: Option<Opcode>,

    value: Arc<RwLock<NeuronValue>>,
    links_out: Arc<RwLock<EdgeSet>>,
    links_in: Arc<RwLock<EdgeSet>>,
    /// Present only for cluster neurons.
    cluster: Option<Arc<RwLock<ClusterData>>>,

    /// Clusters this neuron is currently a child of. Maintained by cluster
    /// mutation paths while they hold the cluster's children lock; a short
    /// internal leaf lock, never exposed as an aspect.
    clustered_by: RwLock<Vec<NeuronId>>,

    /// Transient computation byproduct, eligible for collection.
    temp: AtomicBool,
    /// Dirty flag for the storage bridge.
    changed: AtomicBool,
}

impl NeuronCell {
    pub fn new(id: NeuronId, spec: NeuronSpec) -> Self {
        let (kind, opcode, value, cluster) = match spec {
            NeuronSpec::Leaf(value) => (value.kind(), None, value, None),
            NeuronSpec::Cluster { meaning } => (
                NeuronKind::Cluster,
                None,
                NeuronValue::Empty,
                Some(ClusterData::new(meaning)),
            ),
            NeuronSpec::Instruction(op) => {
                (NeuronKind::Instruction, Some(op), NeuronValue::Empty, None)
            }
            NeuronSpec::Sin => (NeuronKind::Sin, None, NeuronValue::Empty, None),
            NeuronSpec::Timer => (NeuronKind::Timer, None, NeuronValue::Empty, None),
            NeuronSpec::Variable => (NeuronKind::Variable, None, NeuronValue::Empty, None),
        };
        Self {
            id,
            kind,
            opcode,
            value: Arc::new(RwLock::new(value)),
            links_out: Arc::new(RwLock::new(EdgeSet::new())),
            links_in: Arc::new(RwLock::new(EdgeSet::new())),
            cluster: cluster.map(|c| Arc::new(RwLock::new(c))),
            clustered_by: RwLock::new(Vec::new()),
            temp: AtomicBool::new(false),
            changed: AtomicBool::new(false),
        }
    }

    // =========================================================================
    // IDENTITY AND FLAGS
    // =========================================================================

    #[inline]
    pub fn id(&self) -> NeuronId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> NeuronKind {
        self.kind
    }

    #[inline]
    pub fn opcode(&self) -> Option<Opcode> {
        self.opcode
    }

    #[inline]
    pub fn is_cluster(&self) -> bool {
        self.cluster.is_some()
    }

    #[inline]
    pub fn is_temp(&self) -> bool {
        self.temp.load(Ordering::Acquire)
    }

    pub fn set_temp(&self, temp: bool) {
        self.temp.store(temp, Ordering::Release);
    }

    #[inline]
    pub fn is_changed(&self) -> bool {
        self.changed.load(Ordering::Acquire)
    }

    pub fn set_changed(&self, changed: bool) {
        self.changed.store(changed, Ordering::Release);
    }

    // =========================================================================
    // ASPECT LOCK HANDLES (for the lock manager)
    // =========================================================================

    pub(crate) fn value_lock(&self) -> &Arc<RwLock<NeuronValue>> {
        &self.value
    }

    pub(crate) fn links_out_lock(&self) -> &Arc<RwLock<EdgeSet>> {
        &self.links_out
    }

    pub(crate) fn links_in_lock(&self) -> &Arc<RwLock<EdgeSet>> {
        &self.links_in
    }

    pub(crate) fn cluster_lock(&self) -> Option<&Arc<RwLock<ClusterData>>> {
        self.cluster.as_ref()
    }

    /// True if any aspect lock is currently held (shared or exclusive).
    /// Used by the cache bridge: a locked entity is never evicted.
    pub fn is_locked(&self) -> bool {
        self.value.is_locked()
            || self.links_out.is_locked()
            || self.links_in.is_locked()
            || self.cluster.as_ref().is_some_and(|c| c.is_locked())
    }

    // =========================================================================
    // LOCKED SNAPSHOTS (read-only traversal)
    // =========================================================================

    /// Clone of the value payload.
    pub fn value_snapshot(&self) -> NeuronValue {
        self.value.read().clone()
    }

    /// Snapshot of the outgoing links.
    pub fn links_out_snapshot(&self) -> Vec<Link> {
        self.links_out.read().to_vec()
    }

    /// Snapshot of the incoming links.
    pub fn links_in_snapshot(&self) -> Vec<Link> {
        self.links_in.read().to_vec()
    }

    /// Cluster meaning and children snapshot, if this is a cluster.
    pub fn cluster_snapshot(&self) -> Option<(NeuronId, Vec<NeuronId>)> {
        let cluster = self.cluster.as_ref()?.read();
        Some((cluster.meaning, cluster.children.to_vec()))
    }

    /// Clusters currently containing this neuron.
    pub fn clustered_by_snapshot(&self) -> Vec<NeuronId> {
        self.clustered_by.read().clone()
    }

    /// First outgoing link with this meaning, or not-found.
    pub fn find_first_out(&self, meaning: NeuronId) -> Option<Link> {
        self.links_out.read().first_with_meaning(meaning).cloned()
    }

    /// First incoming link with this meaning, or not-found.
    pub fn find_first_in(&self, meaning: NeuronId) -> Option<Link> {
        self.links_in.read().first_with_meaning(meaning).cloned()
    }

    /// True while any link references this neuron from either side.
    pub fn has_links(&self) -> bool {
        !self.links_out.read().is_empty() || !self.links_in.read().is_empty()
    }

    // =========================================================================
    // CLUSTERED-BY MAINTENANCE (called under the owning cluster's lock)
    // =========================================================================

    pub(crate) fn clustered_by_add(&self, cluster: NeuronId) {
        let mut list = self.clustered_by.write();
        if !list.contains(&cluster) {
            list.push(cluster);
        }
    }

    pub(crate) fn clustered_by_remove(&self, cluster: NeuronId) {
        let mut list = self.clustered_by.write();
        if let Some(pos) = list.iter().position(|&c| c == cluster) {
            list.remove(pos);
        }
    }
}

impl std::fmt::Debug for NeuronCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeuronCell")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("temp", &self.is_temp())
            .field("changed", &self.is_changed())
            .finish()
    }
}
