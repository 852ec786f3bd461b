//! Graph Proofs — structural invariants of the entity model.
//!
//! Each test proves one invariant of links, clusters and deletion that the
//! instruction set and the persistence layer both rely on.
//!
//! Run: `cargo test --test proof_graph`

use axon::{Brain, Error, NeuronId, NeuronValue};

// =============================================================================
// G-1: Link existence symmetry
// =============================================================================

/// PROOF G-1: after AddLink(A,B,M) the link is enumerable from both
/// A.links_out and B.links_in; after RemoveLink both sides are empty again.
#[test]
fn graph_g1_link_symmetry() {
    let brain = Brain::in_memory();
    let a = brain.new_neuron(NeuronValue::Int(1)).id();
    let b = brain.new_neuron(NeuronValue::Int(2)).id();
    let m = brain.new_neuron(NeuronValue::Empty).id();

    brain.add_link(a, b, m).unwrap();

    let out = brain.get(a).unwrap().links_out_snapshot();
    let incoming = brain.get(b).unwrap().links_in_snapshot();
    assert_eq!(out.len(), 1);
    assert_eq!(incoming.len(), 1);
    assert!(out[0].same_edge(a, b, m));
    assert!(incoming[0].same_edge(a, b, m));
    assert_eq!(brain.find_first_out(a, m), Some(b));
    assert_eq!(brain.find_first_in(b, m), Some(a));

    brain.remove_link(a, b, m).unwrap();
    assert!(brain.get(a).unwrap().links_out_snapshot().is_empty());
    assert!(brain.get(b).unwrap().links_in_snapshot().is_empty());
}

/// PROOF G-1b: the (from, to, meaning) triple is the link's identity; a
/// second create of the same triple is rejected, a parallel link with a
/// different meaning is not.
#[test]
fn graph_g1_triple_identity() {
    let brain = Brain::in_memory();
    let a = brain.new_neuron(NeuronValue::Int(1)).id();
    let b = brain.new_neuron(NeuronValue::Int(2)).id();
    let m1 = brain.new_neuron(NeuronValue::Empty).id();
    let m2 = brain.new_neuron(NeuronValue::Empty).id();

    brain.add_link(a, b, m1).unwrap();
    assert!(matches!(
        brain.add_link(a, b, m1),
        Err(Error::LinkExists { .. })
    ));
    brain.add_link(a, b, m2).unwrap();
    assert_eq!(brain.get(a).unwrap().links_out_snapshot().len(), 2);
}

// =============================================================================
// G-2: Cluster order preservation
// =============================================================================

/// PROOF G-2: an arbitrary interleaving of insert/move/remove-at on a
/// cluster produces the same order as a plain Vec performing the same
/// operations.
#[test]
fn graph_g2_cluster_order_matches_reference_model() {
    let brain = Brain::in_memory();
    let cluster = brain.new_cluster(NeuronId::EMPTY).id();
    let children: Vec<NeuronId> = (0..8)
        .map(|i| brain.new_neuron(NeuronValue::Int(i)).id())
        .collect();

    let mut model: Vec<NeuronId> = Vec::new();

    brain.add_children(cluster, &children[..4]).unwrap();
    model.extend_from_slice(&children[..4]);

    brain.insert_child(cluster, 2, children[4]).unwrap();
    model.insert(2, children[4]);

    brain.move_child(cluster, 0, 3).unwrap();
    let moved = model.remove(0);
    model.insert(3, moved);

    let removed = brain.remove_child_at(cluster, 1).unwrap();
    assert_eq!(removed, model.remove(1));

    brain.add_children(cluster, &children[5..]).unwrap();
    model.extend_from_slice(&children[5..]);

    let (_, actual) = brain.get(cluster).unwrap().cluster_snapshot().unwrap();
    assert_eq!(actual, model);
}

/// PROOF G-2b: out-of-range indexes are refused without disturbing the
/// existing order.
#[test]
fn graph_g2_out_of_range_is_rejected() {
    let brain = Brain::in_memory();
    let cluster = brain.new_cluster(NeuronId::EMPTY).id();
    let child = brain.new_neuron(NeuronValue::Int(0)).id();
    brain.add_children(cluster, &[child]).unwrap();

    assert!(matches!(
        brain.remove_child_at(cluster, 5),
        Err(Error::OutOfBounds { .. })
    ));
    assert!(matches!(
        brain.insert_child(cluster, 9, child),
        Err(Error::OutOfBounds { .. })
    ));
    let (_, children) = brain.get(cluster).unwrap().cluster_snapshot().unwrap();
    assert_eq!(children, vec![child]);
}

// =============================================================================
// G-3: Deletion policy
// =============================================================================

/// PROOF G-3: deleting a linked neuron refuses under the default policy and
/// leaves the graph untouched; after unlinking the delete goes through and
/// cluster membership is cleaned up on both sides.
#[test]
fn graph_g3_delete_policy() {
    let brain = Brain::in_memory();
    let a = brain.new_neuron(NeuronValue::Int(1)).id();
    let b = brain.new_neuron(NeuronValue::Int(2)).id();
    let m = brain.new_neuron(NeuronValue::Empty).id();
    let cluster = brain.new_cluster(NeuronId::EMPTY).id();
    brain.add_link(a, b, m).unwrap();
    brain.add_children(cluster, &[a]).unwrap();

    assert!(matches!(brain.delete(a), Err(Error::StillLinked(_))));
    assert!(brain.is_valid_id(a));

    brain.remove_link(a, b, m).unwrap();
    brain.delete(a).unwrap();
    assert!(brain.get(a).is_none());
    let (_, children) = brain.get(cluster).unwrap().cluster_snapshot().unwrap();
    assert!(children.is_empty());
}

// =============================================================================
// G-4: Edge index coherence past the lazy-build threshold
// =============================================================================

/// PROOF G-4: first-match and membership answers do not change when the
/// edge count crosses the lazy index threshold, and stay correct across
/// removals.
#[test]
fn graph_g4_index_coherence_across_threshold() {
    let brain = Brain::in_memory();
    let hub = brain.new_neuron(NeuronValue::Int(0)).id();
    let meanings: Vec<NeuronId> = (0..4)
        .map(|_| brain.new_neuron(NeuronValue::Empty).id())
        .collect();
    let mut targets = Vec::new();

    // Well past EDGE_INDEX_THRESHOLD, cycling through four meanings.
    for i in 0..40 {
        let t = brain.new_neuron(NeuronValue::Int(i)).id();
        brain.add_link(hub, t, meanings[(i % 4) as usize]).unwrap();
        targets.push(t);
    }

    // First match per meaning is the earliest inserted link with it.
    for (k, &m) in meanings.iter().enumerate() {
        assert_eq!(brain.find_first_out(hub, m), Some(targets[k]));
    }

    // Removing the current first match promotes the next one in insertion
    // order.
    brain.remove_link(hub, targets[0], meanings[0]).unwrap();
    assert_eq!(brain.find_first_out(hub, meanings[0]), Some(targets[4]));

    let out = brain.get(hub).unwrap().links_out_snapshot();
    assert_eq!(out.len(), 39);
}
