//! Graph-mutation instructions.
//!
//! All of these preload and resolve their operands first, then delegate to
//! the brain's entity operations, which lock exactly the entities being
//! mutated, mutate under lock, mark dirty, and fire the change notification
//! after release. Failures are logged graph-integrity errors; execution
//! continues.

use super::{
    int_of, solve_single_result, ArgCount, Capabilities, Instruction, Opcode, RESULT, STATEMENT,
};
use crate::brain::Brain;
use crate::entity::{NeuronId, NeuronKind, NeuronSpec, NeuronValue};
use crate::processor::Processor;
use std::sync::Arc;

fn solve_all(brain: &Arc<Brain>, proc: &mut Processor, args: &[NeuronId]) -> Option<Vec<NeuronId>> {
    args.iter()
        .map(|&a| solve_single_result(brain, proc, a))
        .collect()
}

fn index_of(brain: &Arc<Brain>, proc: &mut Processor, arg: NeuronId) -> Option<usize> {
    let v = int_of(brain, proc, arg)?;
    usize::try_from(v).ok().or_else(|| {
        tracing::error!(value = v, "negative index");
        None
    })
}

// ============================================================================
// NEURON LIFECYCLE
// ============================================================================

/// Create a fresh temp neuron of the same kind as the template argument.
pub struct NewInstruction;

impl Instruction for NewInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::New
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(1)
    }

    fn capabilities(&self) -> Capabilities {
        RESULT
    }

    fn get_value(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Vec<NeuronId> {
        let Some(template) = solve_single_result(brain, proc, args[0]) else {
            return Vec::new();
        };
        let Some(cell) = brain.get(template) else {
            return Vec::new();
        };
        let spec = match cell.kind() {
            NeuronKind::Int => NeuronSpec::Leaf(NeuronValue::Int(0)),
            NeuronKind::Double => NeuronSpec::Leaf(NeuronValue::Double(0.0)),
            NeuronKind::Text => NeuronSpec::Leaf(NeuronValue::Text(String::new())),
            NeuronKind::Cluster => NeuronSpec::Cluster {
                meaning: NeuronId::EMPTY,
            },
            NeuronKind::Variable => NeuronSpec::Variable,
            _ => NeuronSpec::Leaf(NeuronValue::Empty),
        };
        let fresh = brain.new_from_spec(spec);
        brain.make_temp(fresh.id());
        proc.freeze(fresh.id());
        vec![fresh.id()]
    }
}

/// Delete a neuron, honoring the link-reference policy.
pub struct DeleteInstruction;

impl Instruction for DeleteInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::Delete
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(1)
    }

    fn capabilities(&self) -> Capabilities {
        STATEMENT
    }

    fn execute(&self, brain: &Arc<Brain>, proc: &mut Processor, args: &[NeuronId]) {
        let Some(id) = solve_single_result(brain, proc, args[0]) else {
            return;
        };
        if let Err(e) = brain.delete(id) {
            tracing::error!(neuron = %id, error = %e, "delete refused");
        }
    }
}

/// Flag a neuron as a GC-eligible computation byproduct.
pub struct MakeTempInstruction;

impl Instruction for MakeTempInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::MakeTemp
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(1)
    }

    fn capabilities(&self) -> Capabilities {
        STATEMENT
    }

    fn execute(&self, brain: &Arc<Brain>, proc: &mut Processor, args: &[NeuronId]) {
        if let Some(id) = solve_single_result(brain, proc, args[0]) {
            brain.make_temp(id);
        }
    }
}

// ============================================================================
// LINKS
// ============================================================================

/// Create the link `args[0] -[args[2]]-> args[1]`.
pub struct AddLinkInstruction;

impl Instruction for AddLinkInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::AddLink
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(3)
    }

    fn capabilities(&self) -> Capabilities {
        STATEMENT
    }

    fn execute(&self, brain: &Arc<Brain>, proc: &mut Processor, args: &[NeuronId]) {
        let Some(ops) = solve_all(brain, proc, args) else {
            return;
        };
        if let Err(e) = brain.add_link(ops[0], ops[1], ops[2]) {
            tracing::error!(error = %e, "add link failed");
        }
    }
}

/// Destroy the link `args[0] -[args[2]]-> args[1]`.
pub struct RemoveLinkInstruction;

impl Instruction for RemoveLinkInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::RemoveLink
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(3)
    }

    fn capabilities(&self) -> Capabilities {
        STATEMENT
    }

    fn execute(&self, brain: &Arc<Brain>, proc: &mut Processor, args: &[NeuronId]) {
        let Some(ops) = solve_all(brain, proc, args) else {
            return;
        };
        if let Err(e) = brain.remove_link(ops[0], ops[1], ops[2]) {
            tracing::error!(error = %e, "remove link failed");
        }
    }
}

/// Append `args[3..]` to the info list of link `args[0] -[args[2]]-> args[1]`.
pub struct AddInfoInstruction;

impl Instruction for AddInfoInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::AddInfo
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Variadic
    }

    fn capabilities(&self) -> Capabilities {
        STATEMENT
    }

    fn execute(&self, brain: &Arc<Brain>, proc: &mut Processor, args: &[NeuronId]) {
        if args.len() < 4 {
            tracing::error!(got = args.len(), "AddInfo needs a link triple plus info");
            return;
        }
        let Some(ops) = solve_all(brain, proc, args) else {
            return;
        };
        if let Err(e) = brain.add_info(ops[0], ops[1], ops[2], &ops[3..]) {
            tracing::error!(error = %e, "add info failed");
        }
    }
}

/// Remove position `args[3]` from the info list of the named link.
pub struct RemoveInfoAtInstruction;

impl Instruction for RemoveInfoAtInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::RemoveInfoAt
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(4)
    }

    fn capabilities(&self) -> Capabilities {
        STATEMENT
    }

    fn execute(&self, brain: &Arc<Brain>, proc: &mut Processor, args: &[NeuronId]) {
        let Some(ops) = solve_all(brain, proc, &args[..3]) else {
            return;
        };
        let Some(index) = index_of(brain, proc, args[3]) else {
            return;
        };
        if let Err(e) = brain.remove_info_at(ops[0], ops[1], ops[2], index) {
            tracing::error!(error = %e, "remove info failed");
        }
    }
}

// ============================================================================
// CLUSTER CHILDREN
// ============================================================================

/// Append `args[1..]` to cluster `args[0]`.
pub struct AddChildInstruction;

impl Instruction for AddChildInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::AddChild
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Variadic
    }

    fn capabilities(&self) -> Capabilities {
        STATEMENT
    }

    fn execute(&self, brain: &Arc<Brain>, proc: &mut Processor, args: &[NeuronId]) {
        if args.len() < 2 {
            tracing::error!(got = args.len(), "AddChild needs a cluster and children");
            return;
        }
        let Some(ops) = solve_all(brain, proc, args) else {
            return;
        };
        if let Err(e) = brain.add_children(ops[0], &ops[1..]) {
            tracing::error!(error = %e, "add child failed");
        }
    }
}

/// Insert `args[2]` into cluster `args[0]` at position `args[1]`.
pub struct InsertChildInstruction;

impl Instruction for InsertChildInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::InsertChild
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(3)
    }

    fn capabilities(&self) -> Capabilities {
        STATEMENT
    }

    fn execute(&self, brain: &Arc<Brain>, proc: &mut Processor, args: &[NeuronId]) {
        let Some(cluster) = solve_single_result(brain, proc, args[0]) else {
            return;
        };
        let Some(index) = index_of(brain, proc, args[1]) else {
            return;
        };
        let Some(child) = solve_single_result(brain, proc, args[2]) else {
            return;
        };
        if let Err(e) = brain.insert_child(cluster, index, child) {
            tracing::error!(error = %e, "insert child failed");
        }
    }
}

/// Remove the first occurrence of each of `args[1..]` from cluster `args[0]`.
pub struct RemoveChildInstruction;

impl Instruction for RemoveChildInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::RemoveChild
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Variadic
    }

    fn capabilities(&self) -> Capabilities {
        STATEMENT
    }

    fn execute(&self, brain: &Arc<Brain>, proc: &mut Processor, args: &[NeuronId]) {
        if args.len() < 2 {
            tracing::error!(got = args.len(), "RemoveChild needs a cluster and children");
            return;
        }
        let Some(ops) = solve_all(brain, proc, args) else {
            return;
        };
        if let Err(e) = brain.remove_children(ops[0], &ops[1..]) {
            tracing::error!(error = %e, "remove child failed");
        }
    }
}

/// Remove the child at position `args[1]` from cluster `args[0]`.
pub struct RemoveChildAtInstruction;

impl Instruction for RemoveChildAtInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::RemoveChildAt
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(2)
    }

    fn capabilities(&self) -> Capabilities {
        STATEMENT
    }

    fn execute(&self, brain: &Arc<Brain>, proc: &mut Processor, args: &[NeuronId]) {
        let Some(cluster) = solve_single_result(brain, proc, args[0]) else {
            return;
        };
        let Some(index) = index_of(brain, proc, args[1]) else {
            return;
        };
        if let Err(e) = brain.remove_child_at(cluster, index) {
            tracing::error!(error = %e, "remove child at failed");
        }
    }
}

/// Move the child of cluster `args[0]` from position `args[1]` to `args[2]`.
pub struct MoveChildInstruction;

impl Instruction for MoveChildInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::MoveChild
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(3)
    }

    fn capabilities(&self) -> Capabilities {
        STATEMENT
    }

    fn execute(&self, brain: &Arc<Brain>, proc: &mut Processor, args: &[NeuronId]) {
        let Some(cluster) = solve_single_result(brain, proc, args[0]) else {
            return;
        };
        let Some(from) = index_of(brain, proc, args[1]) else {
            return;
        };
        let Some(to) = index_of(brain, proc, args[2]) else {
            return;
        };
        if let Err(e) = brain.move_child(cluster, from, to) {
            tracing::error!(error = %e, "move child failed");
        }
    }
}

// ============================================================================
// VALUE STORES
// ============================================================================

/// Store the integer result of `args[1]` into neuron `args[0]`.
pub struct StoreIntInstruction;

impl Instruction for StoreIntInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::StoreInt
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(2)
    }

    fn capabilities(&self) -> Capabilities {
        STATEMENT
    }

    fn execute(&self, brain: &Arc<Brain>, proc: &mut Processor, args: &[NeuronId]) {
        let Some(target) = solve_single_result(brain, proc, args[0]) else {
            return;
        };
        let Some(v) = int_of(brain, proc, args[1]) else {
            return;
        };
        if let Err(e) = brain.store_value(target, NeuronValue::Int(v)) {
            tracing::error!(neuron = %target, error = %e, "store failed");
        }
    }
}

/// Bind the results of `args[1..]` to variable `args[0]` in the current scope.
pub struct StoreValueInstruction;

impl Instruction for StoreValueInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::StoreValue
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Variadic
    }

    fn capabilities(&self) -> Capabilities {
        STATEMENT
    }

    fn execute(&self, brain: &Arc<Brain>, proc: &mut Processor, args: &[NeuronId]) {
        if args.is_empty() {
            tracing::error!("StoreValue needs a variable argument");
            return;
        }
        let variable = args[0];
        match brain.get(variable) {
            Some(cell) if cell.kind() == NeuronKind::Variable => {}
            Some(cell) => {
                tracing::error!(neuron = %variable, kind = ?cell.kind(), "StoreValue target is not a variable");
                return;
            }
            None => return,
        }
        let Some(values) = solve_all(brain, proc, &args[1..]) else {
            return;
        };
        proc.variables_mut().set(variable, values);
    }
}
