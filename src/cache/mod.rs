//! Cache / storage bridge — bounds the resident working set.
//!
//! Cold entities are batched into a buffered eviction queue and flushed once
//! the buffer fills or the oldest candidate ages past the configured delay.
//! The cycle itself runs on lookups and explicit ticks, never on insert, so
//! a caller can finish marking a fresh entity dirty first. Dirty entities,
//! and clean ones whose record never reached the backend, are persisted
//! through [`Storage`] before removal; a failed save leaves the entity
//! resident for a later retry — unrecoverable data is never dropped.
//! Entities whose aspect locks are held, or that have outstanding handles,
//! are never evicted out from under their holders.

use crate::entity::{NeuronCell, NeuronId};
use crate::storage::{NeuronRecord, Storage};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Resident-set policy.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum StorageMode {
    /// Never evict once loaded. Small graphs, maximum speed.
    AlwaysInMem,
    /// Evict unless dirty — favors editing scenarios where recently changed
    /// items are revisited.
    StreamWhenPossible,
    /// Evict aggressively, saving dirty entities first — favors long-running
    /// production scenarios with unbounded graph size.
    AlwaysStream,
}

struct CacheInner {
    resident: HashMap<NeuronId, Arc<NeuronCell>>,
    dirty: HashSet<NeuronId>,
    buffer: VecDeque<NeuronId>,
    buffered: HashSet<NeuronId>,
    oldest_buffered_at: Option<Instant>,
}

/// Keeps a bounded working set of neurons resident and streams the rest
/// through the storage backend.
pub struct CacheBridge {
    mode: StorageMode,
    buffer_size: usize,
    delay: Duration,
    storage: Box<dyn Storage>,
    inner: Mutex<CacheInner>,
}

impl CacheBridge {
    pub fn new(
        mode: StorageMode,
        buffer_size: usize,
        delay: Duration,
        storage: Box<dyn Storage>,
    ) -> Self {
        Self {
            mode,
            buffer_size,
            delay,
            storage,
            inner: Mutex::new(CacheInner {
                resident: HashMap::new(),
                dirty: HashSet::new(),
                buffer: VecDeque::new(),
                buffered: HashSet::new(),
                oldest_buffered_at: None,
            }),
        }
    }

    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    /// Direct access to the backend (existence checks, deletes).
    pub fn storage(&self) -> &dyn Storage {
        &*self.storage
    }

    /// Register a newly created neuron as resident. The entity is buffered
    /// as an eviction candidate, but the cycle only runs on a later lookup
    /// or tick; the caller gets to mark it dirty first.
    pub fn insert(&self, cell: Arc<NeuronCell>) {
        let mut inner = self.inner.lock();
        let id = cell.id();
        inner.resident.insert(id, cell);
        Self::touch_locked(self.mode, &mut inner, id);
    }

    /// Resolve an id: resident hit, or stream in from storage.
    ///
    /// Unknown or corrupt ids are a logged error and a failed lookup — never
    /// a crash.
    pub fn get(&self, id: NeuronId) -> Option<Arc<NeuronCell>> {
        let mut inner = self.inner.lock();
        if let Some(cell) = inner.resident.get(&id).cloned() {
            Self::touch_locked(self.mode, &mut inner, id);
            self.maybe_evict(&mut inner, false);
            return Some(cell);
        }
        match self.storage.load(id) {
            Ok(record) => {
                let cell = Arc::new(record.into_cell());
                inner.resident.insert(id, cell.clone());
                Self::touch_locked(self.mode, &mut inner, id);
                self.maybe_evict(&mut inner, false);
                Some(cell)
            }
            Err(e) => {
                tracing::error!(neuron = %id, error = %e, "neuron lookup failed");
                None
            }
        }
    }

    pub fn contains(&self, id: NeuronId) -> bool {
        self.inner.lock().resident.contains_key(&id)
    }

    /// True if the id is resident or known to the backend.
    pub fn is_valid(&self, id: NeuronId) -> bool {
        !id.is_empty() && (self.contains(id) || self.storage.exists(id))
    }

    pub fn resident_len(&self) -> usize {
        self.inner.lock().resident.len()
    }

    /// Mark an entity dirty (write-back candidate).
    pub fn mark_dirty(&self, id: NeuronId) {
        self.inner.lock().dirty.insert(id);
    }

    pub fn is_dirty(&self, id: NeuronId) -> bool {
        self.inner.lock().dirty.contains(&id)
    }

    /// Remove an entity from the resident set and the backend (deletion).
    pub fn remove(&self, id: NeuronId) {
        let mut inner = self.inner.lock();
        inner.resident.remove(&id);
        inner.dirty.remove(&id);
        inner.buffered.remove(&id);
        if let Err(e) = self.storage.delete(id) {
            tracing::error!(neuron = %id, error = %e, "storage delete failed");
        }
    }

    /// Run one eviction cycle now, regardless of buffer fill or age.
    pub fn force_evict(&self) {
        let mut inner = self.inner.lock();
        self.maybe_evict(&mut inner, true);
    }

    /// Persist every dirty entity. Failures are logged; the entity stays
    /// dirty and resident for a later retry.
    pub fn flush_dirty(&self) {
        let mut inner = self.inner.lock();
        let ids: Vec<NeuronId> = inner.dirty.iter().copied().collect();
        for id in ids {
            let Some(cell) = inner.resident.get(&id).cloned() else {
                // Dirty id without a resident cell: nothing left to write.
                inner.dirty.remove(&id);
                continue;
            };
            let record = NeuronRecord::from_cell(&cell);
            match self.storage.save(id, &record) {
                Ok(()) => {
                    inner.dirty.remove(&id);
                    cell.set_changed(false);
                }
                Err(e) => {
                    tracing::error!(neuron = %id, error = %e, "flush failed; keeping dirty");
                }
            }
        }
    }

    /// Drop all cached state (project reset). Nothing is saved.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.resident.clear();
        inner.dirty.clear();
        inner.buffer.clear();
        inner.buffered.clear();
        inner.oldest_buffered_at = None;
    }

    // =========================================================================
    // EVICTION
    // =========================================================================

    fn touch_locked(mode: StorageMode, inner: &mut CacheInner, id: NeuronId) {
        if mode == StorageMode::AlwaysInMem {
            return;
        }
        if inner.buffered.insert(id) {
            inner.buffer.push_back(id);
            if inner.oldest_buffered_at.is_none() {
                inner.oldest_buffered_at = Some(Instant::now());
            }
        }
    }

    fn maybe_evict(&self, inner: &mut CacheInner, force: bool) {
        if self.mode == StorageMode::AlwaysInMem {
            return;
        }
        let aged = inner
            .oldest_buffered_at
            .is_some_and(|t| t.elapsed() >= self.delay);
        if !force && inner.buffer.len() < self.buffer_size && !aged {
            return;
        }

        let candidates: Vec<NeuronId> = inner.buffer.drain(..).collect();
        inner.buffered.clear();
        inner.oldest_buffered_at = None;

        for id in candidates {
            let Some(cell) = inner.resident.get(&id).cloned() else {
                continue;
            };
            // Locked or externally held entities stay resident; they will be
            // re-buffered on their next touch. (resident map + our clone = 2)
            if cell.is_locked() || Arc::strong_count(&cell) > 2 {
                continue;
            }
            let dirty = inner.dirty.contains(&id);
            if dirty && self.mode == StorageMode::StreamWhenPossible {
                continue;
            }
            // A clean entity whose record never reached the backend would be
            // unrecoverable after eviction; save it like a dirty one.
            if dirty || !self.storage.exists(id) {
                let record = NeuronRecord::from_cell(&cell);
                match self.storage.save(id, &record) {
                    Ok(()) => {
                        inner.dirty.remove(&id);
                        cell.set_changed(false);
                    }
                    Err(e) => {
                        tracing::error!(
                            neuron = %id,
                            error = %e,
                            "eviction save failed; entity stays resident"
                        );
                        continue;
                    }
                }
            }
            inner.resident.remove(&id);
            tracing::debug!(neuron = %id, "evicted");
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{NeuronSpec, NeuronValue};
    use crate::storage::MemoryStore;

    fn bridge(mode: StorageMode) -> CacheBridge {
        CacheBridge::new(
            mode,
            4,
            Duration::from_secs(3600),
            Box::new(MemoryStore::new()),
        )
    }

    fn cell(id: u64) -> Arc<NeuronCell> {
        Arc::new(NeuronCell::new(
            NeuronId(id),
            NeuronSpec::Leaf(NeuronValue::Int(id as i64)),
        ))
    }

    #[test]
    fn always_in_mem_never_evicts() {
        let cache = bridge(StorageMode::AlwaysInMem);
        for i in 1..=64 {
            cache.insert(cell(i));
        }
        cache.force_evict();
        assert_eq!(cache.resident_len(), 64);
    }

    #[test]
    fn always_stream_saves_dirty_before_eviction() {
        let cache = bridge(StorageMode::AlwaysStream);
        cache.insert(cell(1));
        cache.mark_dirty(NeuronId(1));
        cache.force_evict();
        assert_eq!(cache.resident_len(), 0);
        assert!(cache.storage().exists(NeuronId(1)));

        // Streams back in on demand
        let reloaded = cache.get(NeuronId(1)).unwrap();
        assert_eq!(reloaded.value_snapshot(), NeuronValue::Int(1));
    }

    #[test]
    fn stream_when_possible_keeps_dirty_resident() {
        let cache = bridge(StorageMode::StreamWhenPossible);
        cache.insert(cell(1));
        cache.insert(cell(2));
        cache.mark_dirty(NeuronId(1));
        cache.force_evict();
        assert!(cache.contains(NeuronId(1)));
        assert!(!cache.contains(NeuronId(2)));
        assert!(cache.is_dirty(NeuronId(1)));
    }

    #[test]
    fn held_handles_block_eviction() {
        let cache = bridge(StorageMode::AlwaysStream);
        let held = cell(1);
        cache.insert(held.clone());
        cache.force_evict();
        assert!(cache.contains(NeuronId(1)));
        drop(held);
        cache.get(NeuronId(1));
        cache.force_evict();
        assert!(!cache.contains(NeuronId(1)));
    }
}
