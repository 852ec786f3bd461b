//! In-memory storage backend.

use super::{NeuronRecord, Storage, StorageError};
use crate::entity::NeuronId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// HashMap-backed store. The default backend for tests and ephemeral brains;
/// also carries failure injection so eviction retry paths can be exercised.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<NeuronId, NeuronRecord>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail until reset. Test hook.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Storage for MemoryStore {
    fn load(&self, id: NeuronId) -> Result<NeuronRecord, StorageError> {
        self.records
            .lock()
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound(id))
    }

    fn save(&self, id: NeuronId, record: &NeuronRecord) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected save failure".into()));
        }
        self.records.lock().insert(id, record.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete(&self, id: NeuronId) -> Result<(), StorageError> {
        self.records.lock().remove(&id);
        Ok(())
    }

    fn exists(&self, id: NeuronId) -> bool {
        self.records.lock().contains_key(&id)
    }
}
