//! Change notifications.
//!
//! Listeners register with the event bus and receive a synchronous fan-out
//! after the protecting lock region has been released. A listener must not
//! re-enter the lock for the aspect the event describes. Handles are plain
//! slot indexes; unsubscribing clears the slot, so no weak references are
//! needed and a cleared brain holds no residual listeners.

use crate::brain::Brain;
use crate::entity::{Link, NeuronId};
use parking_lot::RwLock;
use std::sync::Arc;

/// What happened to a link.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ChangeKind {
    Created,
    Destroyed,
    InfoChanged,
}

/// One change notification.
#[derive(Clone, Debug)]
pub enum BrainEvent {
    /// A neuron aspect changed; `property` names it ("value", "children", ...).
    NeuronChanged {
        id: NeuronId,
        property: &'static str,
    },
    LinkChanged {
        link: Link,
        kind: ChangeKind,
    },
    /// The brain was reset; every cached id is now invalid.
    Cleared,
}

pub trait BrainListener: Send + Sync {
    fn on_event(&self, event: &BrainEvent);
}

/// Subscription handle.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ListenerId(usize);

/// Output channel attached to a Sin neuron. The payload ids are resolved
/// result neurons; the channel reads them through the brain.
pub trait SinChannel: Send + Sync {
    fn output(&self, brain: &Brain, args: &[NeuronId]);
}

pub(crate) struct EventBus {
    listeners: RwLock<Vec<Option<Arc<dyn BrainListener>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn BrainListener>) -> ListenerId {
        let mut listeners = self.listeners.write();
        for (i, slot) in listeners.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(listener);
                return ListenerId(i);
            }
        }
        listeners.push(Some(listener));
        ListenerId(listeners.len() - 1)
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        let mut listeners = self.listeners.write();
        match listeners.get_mut(id.0) {
            Some(slot) if slot.is_some() => *slot = None,
            _ => tracing::debug!(handle = id.0, "unsubscribe of unknown listener"),
        }
    }

    /// Synchronous fan-out. The listener list is snapshotted first so a
    /// listener may (un)subscribe from inside its callback.
    pub fn emit(&self, event: &BrainEvent) {
        let snapshot: Vec<Arc<dyn BrainListener>> =
            self.listeners.read().iter().flatten().cloned().collect();
        for listener in snapshot {
            listener.on_event(event);
        }
    }

    pub fn clear(&self) {
        self.listeners.write().clear();
    }

    #[cfg(test)]
    pub fn active(&self) -> usize {
        self.listeners.read().iter().flatten().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    impl BrainListener for Counter {
        fn on_event(&self, _event: &BrainEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn unsubscribed_listener_stops_receiving() {
        let bus = EventBus::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let id = bus.subscribe(counter.clone());
        bus.emit(&BrainEvent::Cleared);
        bus.unsubscribe(id);
        bus.emit(&BrainEvent::Cleared);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handles_are_reused_after_unsubscribe() {
        let bus = EventBus::new();
        let a = Arc::new(Counter(AtomicUsize::new(0)));
        let id_a = bus.subscribe(a);
        bus.unsubscribe(id_a);
        let b = Arc::new(Counter(AtomicUsize::new(0)));
        let id_b = bus.subscribe(b);
        assert_eq!(id_a, id_b);
        assert_eq!(bus.active(), 1);
    }
}
