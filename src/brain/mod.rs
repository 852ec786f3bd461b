//! The brain facade: the single process-wide access point to the engine.
//!
//! A `Brain` ties together the id allocator, the cache/storage bridge, the
//! lock manager, the instruction set, the scheduler, the suspension registry
//! and the event bus. It is shared as `Arc<Brain>`; every graph mutation
//! goes through it so that locking, dirty tracking and change notification
//! stay in one place. Notifications always fire after the protecting lock
//! region has been released.

mod events;

pub use events::{BrainEvent, BrainListener, ChangeKind, ListenerId, SinChannel};

use crate::cache::CacheBridge;
use crate::config::EngineSettings;
use crate::entity::{Link, NeuronCell, NeuronId, NeuronSpec, NeuronValue};
use crate::instruction::{execute_expression, InstructionSet, Opcode};
use crate::lock::{Aspect, LockManager, LockRequest};
use crate::processor::{Processor, Scheduler, SuspensionRegistry, WaitHandle};
use crate::storage::{MemoryStore, Storage};
use crate::{Error, Result};
use events::EventBus;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

/// Well-known boolean neurons, re-seeded on every fresh start and clear.
const TRUE_ID: NeuronId = NeuronId(1);
const FALSE_ID: NeuronId = NeuronId(2);
const FIRST_FREE_ID: u64 = 3;

pub struct Brain {
    settings: EngineSettings,
    cache: CacheBridge,
    locks: LockManager,
    instructions: InstructionSet,
    scheduler: Scheduler,
    suspensions: SuspensionRegistry,
    events: EventBus,
    sins: RwLock<HashMap<NeuronId, Arc<dyn SinChannel>>>,
    next_id: AtomicU64,
}

impl Brain {
    pub fn new(settings: EngineSettings, storage: Box<dyn Storage>) -> Arc<Self> {
        let cache = CacheBridge::new(
            settings.storage_mode,
            settings.eviction_buffer_size,
            settings.eviction_delay(),
            storage,
        );
        let brain = Arc::new(Self {
            locks: LockManager::new(settings.log_locks),
            scheduler: Scheduler::new(
                settings.max_concurrent_processors,
                settings.min_reserved_for_blocked,
            ),
            settings,
            cache,
            instructions: InstructionSet::new(),
            suspensions: SuspensionRegistry::new(),
            events: EventBus::new(),
            sins: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(FIRST_FREE_ID),
        });
        brain.seed_well_known();
        brain
    }

    /// A brain over an in-memory backend with default settings.
    pub fn in_memory() -> Arc<Self> {
        Self::new(EngineSettings::default(), Box::new(MemoryStore::new()))
    }

    fn seed_well_known(&self) {
        for (id, v) in [(TRUE_ID, 1), (FALSE_ID, 0)] {
            let cell = Arc::new(NeuronCell::new(id, NeuronSpec::Leaf(NeuronValue::Int(v))));
            self.cache.insert(cell);
            self.cache.mark_dirty(id);
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    #[inline]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    #[inline]
    pub fn cache(&self) -> &CacheBridge {
        &self.cache
    }

    #[inline]
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    #[inline]
    pub fn instructions(&self) -> &InstructionSet {
        &self.instructions
    }

    #[inline]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[inline]
    pub fn suspensions(&self) -> &SuspensionRegistry {
        &self.suspensions
    }

    #[inline]
    pub fn true_id(&self) -> NeuronId {
        TRUE_ID
    }

    #[inline]
    pub fn false_id(&self) -> NeuronId {
        FALSE_ID
    }

    /// Resolve an id through the cache, streaming from storage on miss.
    pub fn get(&self, id: NeuronId) -> Option<Arc<NeuronCell>> {
        if id.is_empty() {
            return None;
        }
        self.cache.get(id)
    }

    pub fn is_valid_id(&self, id: NeuronId) -> bool {
        self.cache.is_valid(id)
    }

    // ========================================================================
    // NEURON LIFECYCLE
    // ========================================================================

    fn alloc_id(&self) -> NeuronId {
        NeuronId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Create a neuron from a spec. New neurons are dirty from birth so a
    /// streaming cache cannot drop them before their first save.
    pub fn new_from_spec(&self, spec: NeuronSpec) -> Arc<NeuronCell> {
        let id = self.alloc_id();
        let cell = Arc::new(NeuronCell::new(id, spec));
        self.cache.insert(Arc::clone(&cell));
        self.cache.mark_dirty(id);
        self.events.emit(&BrainEvent::NeuronChanged {
            id,
            property: "created",
        });
        cell
    }

    pub fn new_neuron(&self, value: NeuronValue) -> Arc<NeuronCell> {
        self.new_from_spec(NeuronSpec::Leaf(value))
    }

    pub fn new_cluster(&self, meaning: NeuronId) -> Arc<NeuronCell> {
        self.new_from_spec(NeuronSpec::Cluster { meaning })
    }

    pub fn new_instruction(&self, op: Opcode) -> Arc<NeuronCell> {
        self.new_from_spec(NeuronSpec::Instruction(op))
    }

    pub fn new_variable(&self) -> Arc<NeuronCell> {
        self.new_from_spec(NeuronSpec::Variable)
    }

    pub fn new_sin(&self) -> Arc<NeuronCell> {
        self.new_from_spec(NeuronSpec::Sin)
    }

    /// Build an expression: a cluster whose meaning is a fresh instruction
    /// neuron and whose children are the arguments.
    pub fn new_expression(&self, op: Opcode, args: &[NeuronId]) -> Result<NeuronId> {
        let instr = self.new_instruction(op);
        let expr = self.new_from_spec(NeuronSpec::Cluster {
            meaning: instr.id(),
        });
        self.add_children(expr.id(), args)?;
        Ok(expr.id())
    }

    /// Mark a neuron as a GC-eligible computation byproduct.
    pub fn make_temp(&self, id: NeuronId) {
        match self.get(id) {
            Some(cell) => cell.set_temp(true),
            None => tracing::error!(neuron = %id, "make_temp on unknown neuron"),
        }
    }

    /// Delete a neuron. While links still reference it the delete refuses
    /// (`Error::StillLinked`) under the default policy; with
    /// `error_on_invalid_link_remove` off the remaining links are detached
    /// with a warning. Cluster membership is cleaned up on both sides.
    pub fn delete(&self, id: NeuronId) -> Result<()> {
        let cell = self.get(id).ok_or(Error::UnknownNeuron(id))?;
        if cell.has_links() {
            if self.settings.error_on_invalid_link_remove {
                return Err(Error::StillLinked(id));
            }
            tracing::warn!(neuron = %id, "deleting a neuron that still has links");
            self.detach_links(&cell);
        }
        for cluster in cell.clustered_by_snapshot() {
            if let Err(e) = self.remove_children(cluster, &[id]) {
                tracing::debug!(cluster = %cluster, error = %e, "membership cleanup");
            }
        }
        if let Some((_, children)) = cell.cluster_snapshot() {
            for child in children {
                if let Some(child_cell) = self.get(child) {
                    child_cell.clustered_by_remove(id);
                }
            }
        }
        self.cache.remove(id);
        self.events.emit(&BrainEvent::NeuronChanged {
            id,
            property: "deleted",
        });
        Ok(())
    }

    /// Remove every link touching `cell`, both directions, under one bulk
    /// sorted lock over all affected edge sets.
    fn detach_links(&self, cell: &Arc<NeuronCell>) {
        let id = cell.id();
        let out = cell.links_out_snapshot();
        let incoming = cell.links_in_snapshot();
        let mut requests = vec![
            LockRequest::exclusive(Arc::clone(cell), Aspect::EdgesOut),
            LockRequest::exclusive(Arc::clone(cell), Aspect::EdgesIn),
        ];
        for link in &out {
            if let Some(peer) = self.get(link.to) {
                requests.push(LockRequest::exclusive(peer, Aspect::EdgesIn));
            }
        }
        for link in &incoming {
            if let Some(peer) = self.get(link.from) {
                requests.push(LockRequest::exclusive(peer, Aspect::EdgesOut));
            }
        }
        let mut dirty = vec![id];
        {
            let mut set = self.locks.lock_many(requests);
            for link in &out {
                if let Some(edges) = set.edges_in_mut(link.to) {
                    edges.remove(link.from, link.to, link.meaning);
                    dirty.push(link.to);
                }
                if let Some(edges) = set.edges_out_mut(id) {
                    edges.remove(link.from, link.to, link.meaning);
                }
            }
            for link in &incoming {
                if let Some(edges) = set.edges_out_mut(link.from) {
                    edges.remove(link.from, link.to, link.meaning);
                    dirty.push(link.from);
                }
                if let Some(edges) = set.edges_in_mut(id) {
                    edges.remove(link.from, link.to, link.meaning);
                }
            }
        }
        for peer in dirty {
            self.cache.mark_dirty(peer);
        }
        for link in out.into_iter().chain(incoming) {
            self.events.emit(&BrainEvent::LinkChanged {
                link,
                kind: ChangeKind::Destroyed,
            });
        }
    }

    // ========================================================================
    // LINKS
    // ========================================================================

    /// Create the link `from -[meaning]-> to`, updating both endpoint edge
    /// sets under one bulk sorted lock.
    pub fn add_link(&self, from: NeuronId, to: NeuronId, meaning: NeuronId) -> Result<()> {
        let from_cell = self.get(from).ok_or(Error::UnknownNeuron(from))?;
        let to_cell = self.get(to).ok_or(Error::UnknownNeuron(to))?;
        if !self.is_valid_id(meaning) {
            return Err(Error::UnknownNeuron(meaning));
        }
        {
            let mut set = self.locks.lock_many(vec![
                LockRequest::exclusive(from_cell, Aspect::EdgesOut),
                LockRequest::exclusive(to_cell, Aspect::EdgesIn),
            ]);
            let out = set.edges_out_mut(from).ok_or(Error::UnknownNeuron(from))?;
            if out.contains(from, to, meaning) {
                return Err(Error::LinkExists { from, to, meaning });
            }
            out.push(Link::new(from, to, meaning));
            let incoming = set.edges_in_mut(to).ok_or(Error::UnknownNeuron(to))?;
            incoming.push(Link::new(from, to, meaning));
        }
        self.cache.mark_dirty(from);
        self.cache.mark_dirty(to);
        self.events.emit(&BrainEvent::LinkChanged {
            link: Link::new(from, to, meaning),
            kind: ChangeKind::Created,
        });
        Ok(())
    }

    /// Destroy the link `from -[meaning]-> to`. A missing link is an error
    /// under the default policy and a logged no-op otherwise.
    pub fn remove_link(&self, from: NeuronId, to: NeuronId, meaning: NeuronId) -> Result<()> {
        let from_cell = self.get(from).ok_or(Error::UnknownNeuron(from))?;
        let to_cell = self.get(to).ok_or(Error::UnknownNeuron(to))?;
        let removed = {
            let mut set = self.locks.lock_many(vec![
                LockRequest::exclusive(from_cell, Aspect::EdgesOut),
                LockRequest::exclusive(to_cell, Aspect::EdgesIn),
            ]);
            let out = set.edges_out_mut(from).ok_or(Error::UnknownNeuron(from))?;
            let removed = out.remove(from, to, meaning);
            if removed.is_some() {
                if let Some(incoming) = set.edges_in_mut(to) {
                    incoming.remove(from, to, meaning);
                }
            }
            removed
        };
        match removed {
            Some(link) => {
                self.cache.mark_dirty(from);
                self.cache.mark_dirty(to);
                self.events.emit(&BrainEvent::LinkChanged {
                    link,
                    kind: ChangeKind::Destroyed,
                });
                Ok(())
            }
            None if self.settings.error_on_invalid_link_remove => {
                Err(Error::LinkNotFound { from, to, meaning })
            }
            None => {
                tracing::warn!(%from, %to, %meaning, "remove of a link that does not exist");
                Ok(())
            }
        }
    }

    /// Append info neurons to the canonical (source-side) copy of a link.
    pub fn add_info(
        &self,
        from: NeuronId,
        to: NeuronId,
        meaning: NeuronId,
        info: &[NeuronId],
    ) -> Result<()> {
        let from_cell = self.get(from).ok_or(Error::UnknownNeuron(from))?;
        let updated = {
            let mut set = self.locks.lock(from_cell, Aspect::EdgesOut, true);
            let out = set.edges_out_mut(from).ok_or(Error::UnknownNeuron(from))?;
            let link = out
                .link_mut(from, to, meaning)
                .ok_or(Error::LinkNotFound { from, to, meaning })?;
            link.info.extend_from_slice(info);
            link.clone()
        };
        self.cache.mark_dirty(from);
        self.events.emit(&BrainEvent::LinkChanged {
            link: updated,
            kind: ChangeKind::InfoChanged,
        });
        Ok(())
    }

    /// Remove one position from a link's info list.
    pub fn remove_info_at(
        &self,
        from: NeuronId,
        to: NeuronId,
        meaning: NeuronId,
        index: usize,
    ) -> Result<()> {
        let from_cell = self.get(from).ok_or(Error::UnknownNeuron(from))?;
        let updated = {
            let mut set = self.locks.lock(from_cell, Aspect::EdgesOut, true);
            let out = set.edges_out_mut(from).ok_or(Error::UnknownNeuron(from))?;
            let link = out
                .link_mut(from, to, meaning)
                .ok_or(Error::LinkNotFound { from, to, meaning })?;
            if index >= link.info.len() {
                return Err(Error::OutOfBounds {
                    index,
                    len: link.info.len(),
                });
            }
            link.info.remove(index);
            link.clone()
        };
        self.cache.mark_dirty(from);
        self.events.emit(&BrainEvent::LinkChanged {
            link: updated,
            kind: ChangeKind::InfoChanged,
        });
        Ok(())
    }

    // ========================================================================
    // CLUSTER CHILDREN
    // ========================================================================

    /// Append children to a cluster, maintaining the reverse membership on
    /// each child inside the same lock region.
    pub fn add_children(&self, cluster: NeuronId, children: &[NeuronId]) -> Result<()> {
        if children.is_empty() {
            return Ok(());
        }
        let cell = self.get(cluster).ok_or(Error::UnknownNeuron(cluster))?;
        if !cell.is_cluster() {
            return Err(Error::NotACluster(cluster));
        }
        let mut child_cells = Vec::with_capacity(children.len());
        for &child in children {
            child_cells.push(self.get(child).ok_or(Error::UnknownNeuron(child))?);
        }
        {
            let mut set = self.locks.lock(cell, Aspect::Children, true);
            let data = set.children_mut(cluster).ok_or(Error::NotACluster(cluster))?;
            for &child in children {
                data.children.add(child);
            }
            for child_cell in &child_cells {
                child_cell.clustered_by_add(cluster);
            }
        }
        self.cache.mark_dirty(cluster);
        self.events.emit(&BrainEvent::NeuronChanged {
            id: cluster,
            property: "children",
        });
        Ok(())
    }

    /// Remove the first occurrence of each given child. All must be present
    /// under the default policy; the check runs before any mutation.
    pub fn remove_children(&self, cluster: NeuronId, children: &[NeuronId]) -> Result<()> {
        if children.is_empty() {
            return Ok(());
        }
        let cell = self.get(cluster).ok_or(Error::UnknownNeuron(cluster))?;
        if !cell.is_cluster() {
            return Err(Error::NotACluster(cluster));
        }
        {
            let mut set = self.locks.lock(cell, Aspect::Children, true);
            let data = set.children_mut(cluster).ok_or(Error::NotACluster(cluster))?;
            if self.settings.error_on_invalid_link_remove {
                for &child in children {
                    if !data.children.contains(child) {
                        return Err(Error::InvalidArgument(format!(
                            "{child} is not a child of {cluster}"
                        )));
                    }
                }
            }
            for &child in children {
                if !data.children.remove(child) {
                    continue;
                }
                if !data.children.contains(child) {
                    if let Some(child_cell) = self.get(child) {
                        child_cell.clustered_by_remove(cluster);
                    }
                }
            }
        }
        self.cache.mark_dirty(cluster);
        self.events.emit(&BrainEvent::NeuronChanged {
            id: cluster,
            property: "children",
        });
        Ok(())
    }

    pub fn insert_child(&self, cluster: NeuronId, index: usize, child: NeuronId) -> Result<()> {
        let cell = self.get(cluster).ok_or(Error::UnknownNeuron(cluster))?;
        if !cell.is_cluster() {
            return Err(Error::NotACluster(cluster));
        }
        let child_cell = self.get(child).ok_or(Error::UnknownNeuron(child))?;
        {
            let mut set = self.locks.lock(cell, Aspect::Children, true);
            let data = set.children_mut(cluster).ok_or(Error::NotACluster(cluster))?;
            data.children.insert(index, child)?;
            child_cell.clustered_by_add(cluster);
        }
        self.cache.mark_dirty(cluster);
        self.events.emit(&BrainEvent::NeuronChanged {
            id: cluster,
            property: "children",
        });
        Ok(())
    }

    /// Remove the child at a position, returning its id.
    pub fn remove_child_at(&self, cluster: NeuronId, index: usize) -> Result<NeuronId> {
        let cell = self.get(cluster).ok_or(Error::UnknownNeuron(cluster))?;
        if !cell.is_cluster() {
            return Err(Error::NotACluster(cluster));
        }
        let removed = {
            let mut set = self.locks.lock(cell, Aspect::Children, true);
            let data = set.children_mut(cluster).ok_or(Error::NotACluster(cluster))?;
            let removed = data.children.remove_at(index)?;
            if !data.children.contains(removed) {
                if let Some(child_cell) = self.get(removed) {
                    child_cell.clustered_by_remove(cluster);
                }
            }
            removed
        };
        self.cache.mark_dirty(cluster);
        self.events.emit(&BrainEvent::NeuronChanged {
            id: cluster,
            property: "children",
        });
        Ok(removed)
    }

    pub fn move_child(&self, cluster: NeuronId, from: usize, to: usize) -> Result<()> {
        let cell = self.get(cluster).ok_or(Error::UnknownNeuron(cluster))?;
        if !cell.is_cluster() {
            return Err(Error::NotACluster(cluster));
        }
        {
            let mut set = self.locks.lock(cell, Aspect::Children, true);
            let data = set.children_mut(cluster).ok_or(Error::NotACluster(cluster))?;
            data.children.move_child(from, to)?;
        }
        self.cache.mark_dirty(cluster);
        self.events.emit(&BrainEvent::NeuronChanged {
            id: cluster,
            property: "children",
        });
        Ok(())
    }

    // ========================================================================
    // SUSPENSION
    // ========================================================================

    /// Attach `indicator` to `cluster` and register the suspension as one
    /// step under the cluster's exclusive Children lock. An awake serializes
    /// on the same lock, so it can never slip between the registration and
    /// the attachment. A duplicate registration refuses the whole operation
    /// and leaves the cluster untouched.
    pub fn register_suspension(
        &self,
        cluster: NeuronId,
        indicator: NeuronId,
    ) -> Result<Arc<WaitHandle>> {
        let cell = self.get(cluster).ok_or(Error::UnknownNeuron(cluster))?;
        if !cell.is_cluster() {
            return Err(Error::NotACluster(cluster));
        }
        let indicator_cell = self.get(indicator).ok_or(Error::UnknownNeuron(indicator))?;
        let handle = {
            let mut set = self.locks.lock(cell, Aspect::Children, true);
            let data = set.children_mut(cluster).ok_or(Error::NotACluster(cluster))?;
            let handle = self.suspensions.register(indicator)?;
            data.children.add(indicator);
            indicator_cell.clustered_by_add(cluster);
            handle
        };
        self.cache.mark_dirty(cluster);
        self.events.emit(&BrainEvent::NeuronChanged {
            id: cluster,
            property: "children",
        });
        Ok(handle)
    }

    /// Detach `indicator` from `cluster` and take its registration, under
    /// the same Children lock as [`Brain::register_suspension`]. `None` when
    /// nothing is suspended on the indicator; then nothing is touched. The
    /// caller signals the returned handle after the lock region is gone.
    pub fn awake_suspension(
        &self,
        cluster: NeuronId,
        indicator: NeuronId,
    ) -> Option<Arc<WaitHandle>> {
        let cell = self.get(cluster)?;
        let handle = {
            let mut set = self.locks.lock(cell, Aspect::Children, true);
            let handle = self.suspensions.take(indicator)?;
            if let Some(data) = set.children_mut(cluster) {
                if data.children.remove(indicator) && !data.children.contains(indicator) {
                    if let Some(indicator_cell) = self.get(indicator) {
                        indicator_cell.clustered_by_remove(cluster);
                    }
                }
            }
            handle
        };
        self.cache.mark_dirty(cluster);
        self.events.emit(&BrainEvent::NeuronChanged {
            id: cluster,
            property: "children",
        });
        Some(handle)
    }

    // ========================================================================
    // VALUES
    // ========================================================================

    /// Overwrite a neuron's payload under an exclusive value lock. The
    /// stored value must match the neuron's kind.
    pub fn store_value(&self, target: NeuronId, value: NeuronValue) -> Result<()> {
        let cell = self.get(target).ok_or(Error::UnknownNeuron(target))?;
        {
            let mut set = self.locks.lock(Arc::clone(&cell), Aspect::Value, true);
            let slot = set.value_mut(target).ok_or(Error::UnknownNeuron(target))?;
            if slot.kind() != value.kind() {
                return Err(Error::InvalidArgument(format!(
                    "cannot store a {:?} into {:?} neuron {target}",
                    value.kind(),
                    cell.kind()
                )));
            }
            *slot = value;
        }
        cell.set_changed(true);
        self.cache.mark_dirty(target);
        self.events.emit(&BrainEvent::NeuronChanged {
            id: target,
            property: "value",
        });
        Ok(())
    }

    // ========================================================================
    // SEARCH
    // ========================================================================

    /// Target of the first outgoing link with the given meaning.
    pub fn find_first_out(&self, id: NeuronId, meaning: NeuronId) -> Option<NeuronId> {
        self.get(id)?.find_first_out(meaning).map(|l| l.to)
    }

    /// Source of the first incoming link with the given meaning.
    pub fn find_first_in(&self, id: NeuronId, meaning: NeuronId) -> Option<NeuronId> {
        self.get(id)?.find_first_in(meaning).map(|l| l.from)
    }

    /// First containing cluster whose meaning matches.
    pub fn find_first_clustered_by(&self, id: NeuronId, meaning: NeuronId) -> Option<NeuronId> {
        let cell = self.get(id)?;
        for cluster in cell.clustered_by_snapshot() {
            let Some(cluster_cell) = self.get(cluster) else {
                continue;
            };
            if let Some((m, _)) = cluster_cell.cluster_snapshot() {
                if m == meaning {
                    return Some(cluster);
                }
            }
        }
        None
    }

    // ========================================================================
    // EXECUTION
    // ========================================================================

    /// Run a cluster's instruction list to completion on the calling thread,
    /// through a general scheduler slot. Returns the staged result neurons.
    pub fn run(self: &Arc<Self>, cluster: NeuronId) -> Vec<NeuronId> {
        self.scheduler.note_scheduled();
        self.scheduler.acquire_slot();
        let mut proc = Processor::new();
        proc.set_holds_slot(true);
        let results = if proc.push_call(self, cluster, None) {
            proc.run(self);
            proc.take_staged()
        } else {
            Vec::new()
        };
        self.scheduler.finish();
        results
    }

    /// Run a cluster on a pool thread and return immediately.
    pub fn spawn(self: &Arc<Self>, cluster: NeuronId) {
        self.scheduler.note_scheduled();
        let brain = Arc::clone(self);
        thread::spawn(move || {
            brain.scheduler.acquire_slot();
            let mut proc = Processor::new();
            proc.set_holds_slot(true);
            if proc.push_call(&brain, cluster, None) {
                proc.run(&brain);
            }
            brain.scheduler.finish();
        });
    }

    /// Evaluate a single expression outside any scheduler slot; a test and
    /// host convenience. A suspension reached this way parks the calling
    /// thread without touching the slot accounting.
    pub fn evaluate(self: &Arc<Self>, expr: NeuronId) -> Vec<NeuronId> {
        let mut proc = Processor::new();
        execute_expression(self, &mut proc, expr);
        proc.take_staged()
    }

    /// Block until every spawned processor has finished.
    pub fn wait_idle(&self) {
        self.scheduler.wait_idle();
    }

    // ========================================================================
    // EVENTS AND OUTPUT
    // ========================================================================

    pub fn subscribe(&self, listener: Arc<dyn BrainListener>) -> ListenerId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        self.events.unsubscribe(id)
    }

    /// Attach an output channel to a Sin neuron.
    pub fn register_sin(&self, sin: NeuronId, channel: Arc<dyn SinChannel>) {
        self.sins.write().insert(sin, channel);
    }

    /// Fan a payload out to the channel registered for `sin`.
    pub fn sin_output(&self, sin: NeuronId, args: &[NeuronId]) {
        let channel = self.sins.read().get(&sin).cloned();
        match channel {
            Some(channel) => channel.output(self, args),
            None => tracing::error!(sin = %sin, "no channel registered for sin"),
        }
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Write every dirty neuron back to storage.
    pub fn flush(&self) {
        self.cache.flush_dirty();
    }

    /// Project reset: emit `Cleared`, drop all cached neurons, suspensions,
    /// sin channels and listeners, and re-seed the well-known neurons. The
    /// facade is afterwards in the same state as a fresh start; listeners
    /// re-subscribe.
    pub fn clear(&self) {
        self.events.emit(&BrainEvent::Cleared);
        self.suspensions.clear();
        self.cache.clear();
        self.sins.write().clear();
        self.events.clear();
        self.next_id.store(FIRST_FREE_ID, Ordering::SeqCst);
        self.seed_well_known();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::NeuronKind;

    #[test]
    fn link_lifecycle_updates_both_endpoints() {
        let brain = Brain::in_memory();
        let a = brain.new_neuron(NeuronValue::Int(1)).id();
        let b = brain.new_neuron(NeuronValue::Int(2)).id();
        let m = brain.new_neuron(NeuronValue::Empty).id();

        brain.add_link(a, b, m).unwrap();
        assert!(matches!(
            brain.add_link(a, b, m),
            Err(Error::LinkExists { .. })
        ));
        assert_eq!(brain.find_first_out(a, m), Some(b));
        assert_eq!(brain.find_first_in(b, m), Some(a));

        brain.remove_link(a, b, m).unwrap();
        assert!(matches!(
            brain.remove_link(a, b, m),
            Err(Error::LinkNotFound { .. })
        ));
        assert_eq!(brain.find_first_out(a, m), None);
        assert!(brain.get(b).unwrap().links_in_snapshot().is_empty());
    }

    #[test]
    fn delete_refuses_while_linked() {
        let brain = Brain::in_memory();
        let a = brain.new_neuron(NeuronValue::Int(1)).id();
        let b = brain.new_neuron(NeuronValue::Int(2)).id();
        let m = brain.new_neuron(NeuronValue::Empty).id();
        brain.add_link(a, b, m).unwrap();

        assert!(matches!(brain.delete(a), Err(Error::StillLinked(_))));
        brain.remove_link(a, b, m).unwrap();
        brain.delete(a).unwrap();
        assert!(brain.get(a).is_none());
    }

    #[test]
    fn delete_removes_cluster_membership_both_ways() {
        let brain = Brain::in_memory();
        let cluster = brain.new_cluster(NeuronId::EMPTY).id();
        let child = brain.new_neuron(NeuronValue::Int(7)).id();
        brain.add_children(cluster, &[child]).unwrap();

        brain.delete(child).unwrap();
        let (_, children) = brain.get(cluster).unwrap().cluster_snapshot().unwrap();
        assert!(children.is_empty());
    }

    #[test]
    fn clear_reseeds_well_known_neurons() {
        let brain = Brain::in_memory();
        let id = brain.new_neuron(NeuronValue::Int(42)).id();
        brain.clear();
        assert!(brain.get(id).is_none());
        assert_eq!(
            brain.get(brain.true_id()).unwrap().kind(),
            NeuronKind::Int
        );
        // Allocation restarts past the well-known range.
        let fresh = brain.new_neuron(NeuronValue::Int(1)).id();
        assert_eq!(fresh, NeuronId(FIRST_FREE_ID));
    }

    #[test]
    fn store_value_rejects_kind_mismatch() {
        let brain = Brain::in_memory();
        let n = brain.new_neuron(NeuronValue::Int(1)).id();
        assert!(brain.store_value(n, NeuronValue::Int(5)).is_ok());
        assert!(matches!(
            brain.store_value(n, NeuronValue::Text("x".into())),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(brain.get(n).unwrap().value_snapshot(), NeuronValue::Int(5));
    }

    #[test]
    fn expression_evaluates_to_result_neuron() {
        let brain = Brain::in_memory();
        let two = brain.new_neuron(NeuronValue::Int(2)).id();
        let three = brain.new_neuron(NeuronValue::Int(3)).id();
        let expr = brain
            .new_expression(Opcode::AddInt, &[two, three])
            .unwrap();

        let results = brain.evaluate(expr);
        assert_eq!(results.len(), 1);
        assert_eq!(
            brain.get(results[0]).unwrap().value_snapshot(),
            NeuronValue::Int(5)
        );
    }
}
