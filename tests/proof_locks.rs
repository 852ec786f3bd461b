//! Lock Proofs — mutual exclusion and bulk-acquisition ordering.
//!
//! Run: `cargo test --test proof_locks`

use axon::{Aspect, Brain, LockRequest, NeuronValue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

// =============================================================================
// L-1: Exclusive value locks are mutually exclusive
// =============================================================================

/// PROOF L-1: two threads holding an exclusive value lock on the same
/// neuron never overlap.
///
/// Method: an instrumented counter incremented inside the locked region;
/// its observed maximum must never exceed 1.
#[test]
fn locks_l1_exclusive_value_lock_mutual_exclusion() {
    let brain = Brain::in_memory();
    let id = brain.new_neuron(NeuronValue::Int(0)).id();

    let inside = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let brain = Arc::clone(&brain);
        let inside = Arc::clone(&inside);
        let max_seen = Arc::clone(&max_seen);
        handles.push(thread::spawn(move || {
            for _ in 0..200 {
                let cell = brain.get(id).unwrap();
                let mut set = brain.locks().lock(cell, Aspect::Value, true);
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                if let Some(v) = set.value_mut(id) {
                    if let NeuronValue::Int(n) = v {
                        *n += 1;
                    }
                }
                inside.fetch_sub(1, Ordering::SeqCst);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    assert_eq!(
        brain.get(id).unwrap().value_snapshot(),
        NeuronValue::Int(8 * 200)
    );
}

// =============================================================================
// L-2: Bulk acquisition sorts and dedups
// =============================================================================

/// PROOF L-2: lock_many collapses duplicate (entity, aspect) requests into
/// one guard, with exclusive winning over shared, and grants access to every
/// requested aspect.
#[test]
fn locks_l2_bulk_acquisition_dedups() {
    let brain = Brain::in_memory();
    let a = brain.new_neuron(NeuronValue::Int(1)).id();
    let b = brain.new_neuron(NeuronValue::Int(2)).id();
    let cell_a = brain.get(a).unwrap();
    let cell_b = brain.get(b).unwrap();

    let mut set = brain.locks().lock_many(vec![
        LockRequest::shared(Arc::clone(&cell_a), Aspect::Value),
        LockRequest::exclusive(Arc::clone(&cell_a), Aspect::Value),
        LockRequest::exclusive(cell_b, Aspect::Value),
        LockRequest::shared(cell_a, Aspect::EdgesOut),
    ]);

    assert_eq!(set.len(), 3);
    // The colliding request was upgraded, so a mutable view exists.
    assert!(set.value_mut(a).is_some());
    assert!(set.value_mut(b).is_some());
    assert!(set.edges_out(a).is_some());
}

// =============================================================================
// L-3: The lock set is the only path to locked state
// =============================================================================

/// PROOF L-3: a lock set answers only for the aspects it holds; asking for
/// an unlocked aspect yields nothing instead of unsynchronized access.
#[test]
fn locks_l3_guarded_view_scopes_access() {
    let brain = Brain::in_memory();
    let a = brain.new_neuron(NeuronValue::Int(1)).id();
    let b = brain.new_neuron(NeuronValue::Int(2)).id();
    let cell = brain.get(a).unwrap();

    let set = brain.locks().lock(cell, Aspect::Value, false);
    assert!(set.value(a).is_some());
    assert!(set.value(b).is_none());
    assert!(set.edges_out(a).is_none());
    assert!(set.children(a).is_none());
}

// =============================================================================
// L-4: Readers run concurrently, writers alone
// =============================================================================

/// PROOF L-4: shared locks on the same aspect coexist; an exclusive request
/// waits for them to drop.
#[test]
fn locks_l4_shared_then_exclusive() {
    let brain = Brain::in_memory();
    let id = brain.new_neuron(NeuronValue::Int(7)).id();
    let cell = brain.get(id).unwrap();

    let first = brain.locks().lock(Arc::clone(&cell), Aspect::Value, false);
    let second = brain.locks().lock(Arc::clone(&cell), Aspect::Value, false);
    assert!(first.value(id).is_some());
    assert!(second.value(id).is_some());
    drop(first);

    let writer = {
        let brain = Arc::clone(&brain);
        thread::spawn(move || {
            let cell = brain.get(id).unwrap();
            let mut set = brain.locks().lock(cell, Aspect::Value, true);
            if let Some(v) = set.value_mut(id) {
                *v = NeuronValue::Int(8);
            }
        })
    };
    // The writer cannot finish until the last reader releases.
    thread::sleep(std::time::Duration::from_millis(30));
    assert_eq!(*second.value(id).unwrap(), NeuronValue::Int(7));
    drop(second);
    writer.join().unwrap();
    assert_eq!(brain.get(id).unwrap().value_snapshot(), NeuronValue::Int(8));
}
