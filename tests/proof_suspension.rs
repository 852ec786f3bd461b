//! Suspension Proofs — the suspend/awake protocol and its at-most-one
//! registration invariant.
//!
//! Run: `cargo test --test proof_suspension`

use axon::{Brain, NeuronId, NeuronValue, Opcode};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn program(brain: &Arc<Brain>, exprs: &[NeuronId]) -> NeuronId {
    let prog = brain.new_cluster(NeuronId::EMPTY).id();
    brain.add_children(prog, exprs).unwrap();
    prog
}

fn int_value(brain: &Arc<Brain>, id: NeuronId) -> i64 {
    brain
        .get(id)
        .and_then(|c| c.value_snapshot().as_int())
        .unwrap_or(0)
}

fn wait_for(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("condition not reached within 5s");
}

// =============================================================================
// S-1: At most one suspension per indicator
// =============================================================================

/// PROOF S-1: two processors suspending on the same indicator yield exactly
/// one registration; the refused one completes immediately, and one awake
/// resumes exactly the parked one.
///
/// Method: each program sets a marker after its suspend instruction. The
/// refused program's marker appears while the registration still exists;
/// the parked program's marker appears only after the awake.
#[test]
fn suspension_s1_at_most_one_registration() {
    let brain = Brain::in_memory();
    let flag = brain.new_cluster(NeuronId::EMPTY).id();
    let indicator = brain.new_neuron(NeuronValue::Int(0)).id();
    let one = brain.new_neuron(NeuronValue::Int(1)).id();
    let marker_a = brain.new_neuron(NeuronValue::Int(0)).id();
    let marker_b = brain.new_neuron(NeuronValue::Int(0)).id();

    let prog_a = {
        let suspend = brain
            .new_expression(Opcode::Suspend, &[flag, indicator])
            .unwrap();
        let mark = brain
            .new_expression(Opcode::StoreInt, &[marker_a, one])
            .unwrap();
        program(&brain, &[suspend, mark])
    };
    let prog_b = {
        let suspend = brain
            .new_expression(Opcode::Suspend, &[flag, indicator])
            .unwrap();
        let mark = brain
            .new_expression(Opcode::StoreInt, &[marker_b, one])
            .unwrap();
        program(&brain, &[suspend, mark])
    };

    brain.spawn(prog_a);
    brain.spawn(prog_b);

    // One processor parks, the other is refused and runs to completion.
    wait_for(|| {
        brain.suspensions().is_registered(indicator)
            && (int_value(&brain, marker_a) + int_value(&brain, marker_b) == 1)
    });

    // The indicator was attached to the flag cluster by the parked one.
    let (_, children) = brain.get(flag).unwrap().cluster_snapshot().unwrap();
    assert_eq!(children, vec![indicator]);

    let awake = brain
        .new_expression(Opcode::Awake, &[flag, indicator])
        .unwrap();
    brain.run(program(&brain, &[awake]));
    brain.wait_idle();

    assert!(!brain.suspensions().is_registered(indicator));
    assert_eq!(int_value(&brain, marker_a), 1);
    assert_eq!(int_value(&brain, marker_b), 1);
    let (_, children) = brain.get(flag).unwrap().cluster_snapshot().unwrap();
    assert!(children.is_empty());
}

// =============================================================================
// S-2: Awake without a registration is a silent no-op
// =============================================================================

/// PROOF S-2: awaking an indicator nobody suspended on resumes nothing and
/// leaves the registry empty.
#[test]
fn suspension_s2_awake_without_registration_noops() {
    let brain = Brain::in_memory();
    let flag = brain.new_cluster(NeuronId::EMPTY).id();
    let indicator = brain.new_neuron(NeuronValue::Int(0)).id();

    let awake = brain
        .new_expression(Opcode::Awake, &[flag, indicator])
        .unwrap();
    brain.run(program(&brain, &[awake]));
    brain.wait_idle();

    assert!(brain.suspensions().is_empty());
}

// =============================================================================
// S-3: A suspended processor frees its scheduler slot
// =============================================================================

/// PROOF S-3: while a processor is parked, other work still gets a slot
/// even at a concurrency limit of one general slot.
#[test]
fn suspension_s3_parked_processor_releases_its_slot() {
    let mut settings = axon::EngineSettings::default();
    settings.max_concurrent_processors = 2;
    settings.min_reserved_for_blocked = 1;
    let brain = Brain::new(settings, Box::new(axon::MemoryStore::new()));

    let flag = brain.new_cluster(NeuronId::EMPTY).id();
    let indicator = brain.new_neuron(NeuronValue::Int(0)).id();
    let one = brain.new_neuron(NeuronValue::Int(1)).id();
    let marker = brain.new_neuron(NeuronValue::Int(0)).id();

    let suspend = brain
        .new_expression(Opcode::Suspend, &[flag, indicator])
        .unwrap();
    brain.spawn(program(&brain, &[suspend]));
    wait_for(|| brain.suspensions().is_registered(indicator));

    // The single general slot is free again: this run would hang otherwise.
    let mark = brain
        .new_expression(Opcode::StoreInt, &[marker, one])
        .unwrap();
    brain.run(program(&brain, &[mark]));
    assert_eq!(int_value(&brain, marker), 1);

    let awake = brain
        .new_expression(Opcode::Awake, &[flag, indicator])
        .unwrap();
    brain.run(program(&brain, &[awake]));
    brain.wait_idle();
}

// =============================================================================
// S-4: Awake racing the suspend never strands the indicator
// =============================================================================

/// PROOF S-4: registration and indicator attachment happen as one step, so
/// an awake firing at any point either resumes the parked processor or
/// no-ops; the indicator is never left behind in the cluster.
#[test]
fn suspension_s4_racing_awake_never_strands_the_indicator() {
    for _ in 0..32 {
        let brain = Brain::in_memory();
        let flag = brain.new_cluster(NeuronId::EMPTY).id();
        let indicator = brain.new_neuron(NeuronValue::Int(0)).id();
        let one = brain.new_neuron(NeuronValue::Int(1)).id();
        let marker = brain.new_neuron(NeuronValue::Int(0)).id();

        let suspend = brain
            .new_expression(Opcode::Suspend, &[flag, indicator])
            .unwrap();
        let mark = brain
            .new_expression(Opcode::StoreInt, &[marker, one])
            .unwrap();
        brain.spawn(program(&brain, &[suspend, mark]));

        // Fire awakes immediately; an early one must no-op, a late one must
        // take the registration together with the attached indicator.
        let awake = brain
            .new_expression(Opcode::Awake, &[flag, indicator])
            .unwrap();
        let awake_prog = program(&brain, &[awake]);
        let mut spins = 0;
        while int_value(&brain, marker) == 0 {
            brain.run(awake_prog);
            spins += 1;
            if spins > 10_000 {
                panic!("suspended program never resumed");
            }
            thread::yield_now();
        }
        brain.wait_idle();

        assert!(brain.suspensions().is_empty());
        let (_, children) = brain.get(flag).unwrap().cluster_snapshot().unwrap();
        assert!(children.is_empty(), "indicator left in cluster: {children:?}");
    }
}

// =============================================================================
// S-5: Suspending outside a scheduler slot leaves the accounting alone
// =============================================================================

/// PROOF S-5: a suspension reached through `evaluate`, which holds no
/// scheduler slot, releases nothing and reacquires nothing; the running
/// count stays balanced before and after the resume.
#[test]
fn suspension_s5_evaluate_suspend_keeps_slot_accounting() {
    let brain = Brain::in_memory();
    let flag = brain.new_cluster(NeuronId::EMPTY).id();
    let indicator = brain.new_neuron(NeuronValue::Int(0)).id();
    let suspend = brain
        .new_expression(Opcode::Suspend, &[flag, indicator])
        .unwrap();

    let parked = {
        let brain = Arc::clone(&brain);
        thread::spawn(move || {
            brain.evaluate(suspend);
        })
    };
    wait_for(|| brain.suspensions().is_registered(indicator));
    assert_eq!(brain.scheduler().running(), 0);

    let awake = brain
        .new_expression(Opcode::Awake, &[flag, indicator])
        .unwrap();
    brain.run(program(&brain, &[awake]));
    parked.join().unwrap();
    assert_eq!(brain.scheduler().running(), 0);
}
