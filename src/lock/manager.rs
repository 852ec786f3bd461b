//! Lock acquisition, the guarded view, and the held-key ledger.

use super::Aspect;
use crate::entity::{ClusterData, EdgeSet, NeuronCell, NeuronId, NeuronValue};
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::RawRwLock;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;

type Shared<T> = ArcRwLockReadGuard<RawRwLock, T>;
type Exclusive<T> = ArcRwLockWriteGuard<RawRwLock, T>;

/// One entry in a bulk lock request.
pub struct LockRequest {
    pub cell: Arc<NeuronCell>,
    pub aspect: Aspect,
    pub exclusive: bool,
}

impl LockRequest {
    pub fn shared(cell: Arc<NeuronCell>, aspect: Aspect) -> Self {
        Self {
            cell,
            aspect,
            exclusive: false,
        }
    }

    pub fn exclusive(cell: Arc<NeuronCell>, aspect: Aspect) -> Self {
        Self {
            cell,
            aspect,
            exclusive: true,
        }
    }
}

/// An owned guard over one locked aspect.
enum AspectGuard {
    ValueShared(Shared<NeuronValue>),
    ValueExclusive(Exclusive<NeuronValue>),
    EdgesShared(Shared<EdgeSet>),
    EdgesExclusive(Exclusive<EdgeSet>),
    ChildrenShared(Shared<ClusterData>),
    ChildrenExclusive(Exclusive<ClusterData>),
}

// Thread-local ledger of held (entity, aspect) keys. Acquiring a key that is
// not strictly greater than every held key breaks the global order and is
// logged as a contract violation.
thread_local! {
    static HELD: RefCell<Vec<(NeuronId, Aspect)>> = const { RefCell::new(Vec::new()) };
}

/// Guarded view over a set of locked aspects — the capability token.
///
/// Accessors return `None` for aspects that were not part of the request (or
/// where a `_mut` accessor is used on a shared acquisition). Dropping the set
/// releases every lock.
pub struct LockSet {
    guards: BTreeMap<(NeuronId, Aspect), AspectGuard>,
}

impl LockSet {
    /// Number of held (entity, aspect) locks.
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    pub fn value(&self, id: NeuronId) -> Option<&NeuronValue> {
        match self.guards.get(&(id, Aspect::Value))? {
            AspectGuard::ValueShared(g) => Some(g),
            AspectGuard::ValueExclusive(g) => Some(g),
            _ => None,
        }
    }

    pub fn value_mut(&mut self, id: NeuronId) -> Option<&mut NeuronValue> {
        match self.guards.get_mut(&(id, Aspect::Value))? {
            AspectGuard::ValueExclusive(g) => Some(g),
            _ => None,
        }
    }

    pub fn edges_out(&self, id: NeuronId) -> Option<&EdgeSet> {
        self.edges(id, Aspect::EdgesOut)
    }

    pub fn edges_out_mut(&mut self, id: NeuronId) -> Option<&mut EdgeSet> {
        self.edges_mut(id, Aspect::EdgesOut)
    }

    pub fn edges_in(&self, id: NeuronId) -> Option<&EdgeSet> {
        self.edges(id, Aspect::EdgesIn)
    }

    pub fn edges_in_mut(&mut self, id: NeuronId) -> Option<&mut EdgeSet> {
        self.edges_mut(id, Aspect::EdgesIn)
    }

    pub fn children(&self, id: NeuronId) -> Option<&ClusterData> {
        match self.guards.get(&(id, Aspect::Children))? {
            AspectGuard::ChildrenShared(g) => Some(g),
            AspectGuard::ChildrenExclusive(g) => Some(g),
            _ => None,
        }
    }

    pub fn children_mut(&mut self, id: NeuronId) -> Option<&mut ClusterData> {
        match self.guards.get_mut(&(id, Aspect::Children))? {
            AspectGuard::ChildrenExclusive(g) => Some(g),
            _ => None,
        }
    }

    fn edges(&self, id: NeuronId, aspect: Aspect) -> Option<&EdgeSet> {
        match self.guards.get(&(id, aspect))? {
            AspectGuard::EdgesShared(g) => Some(g),
            AspectGuard::EdgesExclusive(g) => Some(g),
            _ => None,
        }
    }

    fn edges_mut(&mut self, id: NeuronId, aspect: Aspect) -> Option<&mut EdgeSet> {
        match self.guards.get_mut(&(id, aspect))? {
            AspectGuard::EdgesExclusive(g) => Some(g),
            _ => None,
        }
    }
}

impl Drop for LockSet {
    fn drop(&mut self) {
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            held.retain(|key| !self.guards.contains_key(key));
        });
    }
}

/// Grants `(entity, aspect)` locks and enforces the acquisition order.
pub struct LockManager {
    log_locks: bool,
}

impl LockManager {
    pub fn new(log_locks: bool) -> Self {
        Self { log_locks }
    }

    /// Lock a single aspect of a single neuron.
    ///
    /// Operations touching more than one (entity, aspect) must use
    /// [`lock_many`](Self::lock_many) instead of nesting calls to this.
    pub fn lock(&self, cell: Arc<NeuronCell>, aspect: Aspect, exclusive: bool) -> LockSet {
        self.lock_many(vec![LockRequest {
            cell,
            aspect,
            exclusive,
        }])
    }

    /// Lock a set of aspects in the globally consistent order.
    ///
    /// Requests are sorted by `(NeuronId, Aspect)` and deduplicated — when
    /// the same key is requested both shared and exclusive, exclusive wins.
    /// Blocks until every lock is granted.
    pub fn lock_many(&self, requests: Vec<LockRequest>) -> LockSet {
        // Sort + dedup into the canonical acquisition order.
        let mut wanted: BTreeMap<(NeuronId, Aspect), (Arc<NeuronCell>, bool)> = BTreeMap::new();
        for req in requests {
            let key = (req.cell.id(), req.aspect);
            let entry = wanted.entry(key).or_insert((req.cell, false));
            entry.1 |= req.exclusive;
        }

        let mut guards = BTreeMap::new();
        for ((id, aspect), (cell, exclusive)) in wanted {
            self.check_order(id, aspect);
            let Some(guard) = acquire(&cell, aspect, exclusive) else {
                tracing::error!(neuron = %id, ?aspect, "lock requested on aspect the neuron does not have");
                continue;
            };
            if self.log_locks {
                tracing::debug!(neuron = %id, ?aspect, exclusive, "lock acquired");
            }
            HELD.with(|held| held.borrow_mut().push((id, aspect)));
            guards.insert((id, aspect), guard);
        }
        LockSet { guards }
    }

    // Acquiring a key while holding an equal-or-greater one inverts the
    // global order — a caller bug, not a recoverable runtime state.
    fn check_order(&self, id: NeuronId, aspect: Aspect) {
        let key = (id, aspect);
        HELD.with(|held| {
            if held.borrow().iter().any(|&h| h >= key) {
                tracing::error!(
                    neuron = %id,
                    ?aspect,
                    "lock order violation: requested lock is not greater than a held lock"
                );
            }
        });
    }
}

fn acquire(cell: &Arc<NeuronCell>, aspect: Aspect, exclusive: bool) -> Option<AspectGuard> {
    let guard = match (aspect, exclusive) {
        (Aspect::Value, false) => AspectGuard::ValueShared(cell.value_lock().read_arc()),
        (Aspect::Value, true) => AspectGuard::ValueExclusive(cell.value_lock().write_arc()),
        (Aspect::EdgesOut, false) => AspectGuard::EdgesShared(cell.links_out_lock().read_arc()),
        (Aspect::EdgesOut, true) => AspectGuard::EdgesExclusive(cell.links_out_lock().write_arc()),
        (Aspect::EdgesIn, false) => AspectGuard::EdgesShared(cell.links_in_lock().read_arc()),
        (Aspect::EdgesIn, true) => AspectGuard::EdgesExclusive(cell.links_in_lock().write_arc()),
        (Aspect::Children, false) => AspectGuard::ChildrenShared(cell.cluster_lock()?.read_arc()),
        (Aspect::Children, true) => AspectGuard::ChildrenExclusive(cell.cluster_lock()?.write_arc()),
    };
    Some(guard)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{NeuronSpec, NeuronValue};

    fn cell(id: u64) -> Arc<NeuronCell> {
        Arc::new(NeuronCell::new(
            NeuronId(id),
            NeuronSpec::Leaf(NeuronValue::Int(0)),
        ))
    }

    #[test]
    fn value_mut_requires_exclusive() {
        let manager = LockManager::new(false);
        let n = cell(1);

        let set = manager.lock(n.clone(), Aspect::Value, false);
        assert!(set.value(NeuronId(1)).is_some());
        drop(set);

        let mut set = manager.lock(n, Aspect::Value, true);
        *set.value_mut(NeuronId(1)).unwrap() = NeuronValue::Int(7);
        drop(set);
    }

    #[test]
    fn bulk_acquisition_dedups_and_upgrades() {
        let manager = LockManager::new(false);
        let n = cell(2);
        let mut set = manager.lock_many(vec![
            LockRequest::shared(n.clone(), Aspect::Value),
            LockRequest::exclusive(n.clone(), Aspect::Value),
            LockRequest::exclusive(n.clone(), Aspect::EdgesOut),
        ]);
        assert_eq!(set.len(), 2);
        assert!(set.value_mut(NeuronId(2)).is_some());
        assert!(set.edges_out_mut(NeuronId(2)).is_some());
    }

    #[test]
    fn children_on_non_cluster_is_skipped() {
        let manager = LockManager::new(false);
        let n = cell(3);
        let set = manager.lock(n, Aspect::Children, true);
        assert!(set.is_empty());
        assert!(set.children(NeuronId(3)).is_none());
    }

    #[test]
    fn shared_readers_coexist() {
        let manager = LockManager::new(false);
        let n = cell(4);
        let a = manager.lock(n.clone(), Aspect::Value, false);
        let b = manager.lock(n.clone(), Aspect::Value, false);
        assert!(a.value(NeuronId(4)).is_some());
        assert!(b.value(NeuronId(4)).is_some());
    }
}
