//! Eviction Proofs — the cache/storage bridge never loses dirty data.
//!
//! Run: `cargo test --test proof_eviction`

use axon::{
    CacheBridge, MemoryStore, NeuronCell, NeuronId, NeuronRecord, NeuronSpec, NeuronValue, Storage,
    StorageError, StorageMode,
};
use std::sync::Arc;
use std::time::Duration;

/// MemoryStore kept reachable from the test after the bridge takes
/// ownership of its `Box<dyn Storage>`.
#[derive(Clone)]
struct SharedStore(Arc<MemoryStore>);

impl Storage for SharedStore {
    fn load(&self, id: NeuronId) -> Result<NeuronRecord, StorageError> {
        self.0.load(id)
    }

    fn save(&self, id: NeuronId, record: &NeuronRecord) -> Result<(), StorageError> {
        self.0.save(id, record)
    }

    fn delete(&self, id: NeuronId) -> Result<(), StorageError> {
        self.0.delete(id)
    }

    fn exists(&self, id: NeuronId) -> bool {
        self.0.exists(id)
    }
}

fn bridge(mode: StorageMode) -> (CacheBridge, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let bridge = CacheBridge::new(
        mode,
        2,
        Duration::from_secs(3600),
        Box::new(SharedStore(Arc::clone(&store))),
    );
    (bridge, store)
}

fn cell(id: u64) -> Arc<NeuronCell> {
    Arc::new(NeuronCell::new(
        NeuronId(id),
        NeuronSpec::Leaf(NeuronValue::Int(id as i64)),
    ))
}

// =============================================================================
// E-1: Dirty data is saved exactly once before leaving the resident set
// =============================================================================

/// PROOF E-1: under AlwaysStream, a dirty entity forced out of the resident
/// set produces exactly one save carrying its latest value.
#[test]
fn eviction_e1_dirty_saved_before_eviction() {
    let (bridge, store) = bridge(StorageMode::AlwaysStream);
    bridge.insert(cell(10));
    bridge.mark_dirty(NeuronId(10));

    bridge.force_evict();

    assert_eq!(store.save_count(), 1);
    assert!(!bridge.contains(NeuronId(10)));
    assert!(!bridge.is_dirty(NeuronId(10)));
    // The value streams back in intact.
    let reloaded = bridge.get(NeuronId(10)).unwrap();
    assert_eq!(reloaded.value_snapshot(), NeuronValue::Int(10));
}

// =============================================================================
// E-2: A failed save never discards the entity
// =============================================================================

/// PROOF E-2: a storage failure during eviction leaves the entity resident
/// and still dirty, and a later cycle retries the save.
#[test]
fn eviction_e2_failed_save_keeps_entity_resident_and_dirty() {
    let (bridge, store) = bridge(StorageMode::AlwaysStream);
    bridge.insert(cell(11));
    bridge.mark_dirty(NeuronId(11));

    store.set_fail_saves(true);
    bridge.force_evict();
    assert!(bridge.contains(NeuronId(11)));
    assert!(bridge.is_dirty(NeuronId(11)));

    store.set_fail_saves(false);
    // Re-touch so the entity is a candidate again, then retry.
    let _ = bridge.get(NeuronId(11));
    bridge.force_evict();
    assert!(!bridge.contains(NeuronId(11)));
    assert_eq!(store.save_count(), 1);
}

// =============================================================================
// E-3: StreamWhenPossible holds dirty entities in memory
// =============================================================================

/// PROOF E-3: under StreamWhenPossible only clean entities are evicted;
/// dirty ones wait for an explicit flush. The clean one is still written
/// out on its way, since its record had never reached the backend.
#[test]
fn eviction_e3_stream_when_possible_spares_dirty() {
    let (bridge, store) = bridge(StorageMode::StreamWhenPossible);
    bridge.insert(cell(20));
    bridge.insert(cell(21));
    bridge.mark_dirty(NeuronId(20));

    bridge.force_evict();

    assert!(bridge.contains(NeuronId(20)));
    assert!(!bridge.contains(NeuronId(21)));
    assert!(store.exists(NeuronId(21)));
    assert_eq!(store.save_count(), 1);

    bridge.flush_dirty();
    assert_eq!(store.save_count(), 2);
    assert!(!bridge.is_dirty(NeuronId(20)));
}

// =============================================================================
// E-4: AlwaysInMem never evicts
// =============================================================================

/// PROOF E-4: under AlwaysInMem nothing leaves the resident set regardless
/// of pressure.
#[test]
fn eviction_e4_always_in_mem_never_evicts() {
    let (bridge, store) = bridge(StorageMode::AlwaysInMem);
    for i in 0..16 {
        bridge.insert(cell(100 + i));
    }
    bridge.force_evict();
    assert_eq!(bridge.resident_len(), 16);
    assert_eq!(store.save_count(), 0);
}

// =============================================================================
// E-5: Held entities stay resident
// =============================================================================

/// PROOF E-5: an entity with an outside holder is skipped by the eviction
/// cycle and collected on a later one once released.
#[test]
fn eviction_e5_outside_holders_block_eviction() {
    let (bridge, _store) = bridge(StorageMode::AlwaysStream);
    let held = cell(30);
    bridge.insert(Arc::clone(&held));

    bridge.force_evict();
    assert!(bridge.contains(NeuronId(30)));

    drop(held);
    let _ = bridge.get(NeuronId(30));
    bridge.force_evict();
    assert!(!bridge.contains(NeuronId(30)));
}

// =============================================================================
// E-6: Never-persisted entities survive the eviction cycle
// =============================================================================

/// PROOF E-6: entities inserted but never marked dirty still reach storage
/// before leaving the resident set; a buffer-filling series of inserts loses
/// nothing, and every value streams back intact.
#[test]
fn eviction_e6_unsaved_clean_entities_survive_eviction() {
    let (bridge, store) = bridge(StorageMode::AlwaysStream);
    bridge.insert(cell(40));
    bridge.insert(cell(41));

    // The buffer (size 2) is full; run the cycle with both entities clean
    // and absent from the backend.
    bridge.force_evict();
    assert!(store.exists(NeuronId(40)));
    assert!(store.exists(NeuronId(41)));

    let reloaded = bridge.get(NeuronId(40)).unwrap();
    assert_eq!(reloaded.value_snapshot(), NeuronValue::Int(40));
    let reloaded = bridge.get(NeuronId(41)).unwrap();
    assert_eq!(reloaded.value_snapshot(), NeuronValue::Int(41));
}
