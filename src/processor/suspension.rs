//! Suspension registry.
//!
//! Maps an indicator neuron to the wait handle of the processor parked on
//! it. At most one registration per indicator exists at a time; a duplicate
//! is a contract violation reported to the caller. There is no timeout: a
//! registration that is never awoken stays in the registry until `clear`.

use crate::entity::NeuronId;
use crate::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;

/// One-shot wait handle. `wait` returns once `signal` has run, in either
/// order.
pub struct WaitHandle {
    signalled: Mutex<bool>,
    condvar: Condvar,
}

impl WaitHandle {
    pub fn new() -> Self {
        Self {
            signalled: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Park the calling thread until `signal`.
    pub fn wait(&self) {
        let mut signalled = self.signalled.lock();
        while !*signalled {
            self.condvar.wait(&mut signalled);
        }
    }

    pub fn signal(&self) {
        let mut signalled = self.signalled.lock();
        *signalled = true;
        self.condvar.notify_all();
    }
}

impl Default for WaitHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide indicator → wait handle map.
pub struct SuspensionRegistry {
    entries: Mutex<HashMap<NeuronId, Arc<WaitHandle>>>,
}

impl SuspensionRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register a suspension on `indicator`. Refused when the indicator is
    /// already taken.
    pub fn register(&self, indicator: NeuronId) -> Result<Arc<WaitHandle>> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&indicator) {
            return Err(Error::DuplicateSuspension(indicator));
        }
        let handle = Arc::new(WaitHandle::new());
        entries.insert(indicator, Arc::clone(&handle));
        Ok(handle)
    }

    /// Remove and return the registration for `indicator`, if any.
    pub fn take(&self, indicator: NeuronId) -> Option<Arc<WaitHandle>> {
        self.entries.lock().remove(&indicator)
    }

    pub fn is_registered(&self, indicator: NeuronId) -> bool {
        self.entries.lock().contains_key(&indicator)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every registration, signalling the parked threads so they do not
    /// hang across a brain reset.
    pub fn clear(&self) {
        let entries: Vec<_> = {
            let mut map = self.entries.lock();
            map.drain().collect()
        };
        for (_, handle) in entries {
            handle.signal();
        }
    }
}

impl Default for SuspensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn second_registration_is_refused() {
        let reg = SuspensionRegistry::new();
        let indicator = NeuronId(7);
        assert!(reg.register(indicator).is_ok());
        assert!(matches!(
            reg.register(indicator),
            Err(Error::DuplicateSuspension(_))
        ));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn take_empties_the_slot() {
        let reg = SuspensionRegistry::new();
        let indicator = NeuronId(7);
        reg.register(indicator).unwrap();
        assert!(reg.take(indicator).is_some());
        assert!(reg.take(indicator).is_none());
        assert!(reg.register(indicator).is_ok());
    }

    #[test]
    fn signal_releases_a_parked_thread() {
        let handle = Arc::new(WaitHandle::new());
        let waiter = {
            let handle = Arc::clone(&handle);
            thread::spawn(move || handle.wait())
        };
        thread::sleep(Duration::from_millis(20));
        handle.signal();
        waiter.join().unwrap();
    }

    #[test]
    fn signal_before_wait_does_not_park() {
        let handle = WaitHandle::new();
        handle.signal();
        handle.wait();
    }
}
