//! Set-membership queries over edge and child sets.
//!
//! These are the hot path of pattern evaluation: each one takes a single
//! shared lock on the set it inspects and relies on the edge-set meaning
//! index when present, falling back to the linear scan below the threshold.

use super::{
    bool_neuron, solve_single_result, ArgCount, Capabilities, Instruction, Opcode, CALC_BOOL,
    RESULT,
};
use crate::brain::Brain;
use crate::entity::NeuronId;
use crate::lock::Aspect;
use crate::processor::Processor;
use std::sync::Arc;

fn too_few(op: Opcode, args: &[NeuronId], min: usize) -> bool {
    if args.len() < min {
        tracing::error!(opcode = ?op, got = args.len(), min, "too few arguments");
        return true;
    }
    false
}

/// Does `args[0]` have outgoing links for every meaning in `args[1..]`?
pub struct ContainsLinksOutInstruction;

impl Instruction for ContainsLinksOutInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::ContainsLinksOut
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Variadic
    }

    fn capabilities(&self) -> Capabilities {
        CALC_BOOL | RESULT
    }

    fn calculate_bool(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Option<bool> {
        if too_few(self.opcode(), args, 2) {
            return None;
        }
        let target = solve_single_result(brain, proc, args[0])?;
        let cell = brain.get(target)?;
        let id = cell.id();
        let set = brain.locks().lock(cell, Aspect::EdgesOut, false);
        let edges = set.edges_out(id)?;
        Some(args[1..].iter().all(|&m| edges.contains_meaning(m)))
    }

    fn get_value(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Vec<NeuronId> {
        let v = self.calculate_bool(brain, proc, args).unwrap_or(false);
        vec![bool_neuron(brain, v)]
    }
}

/// Does `args[0]` have incoming links for every meaning in `args[1..]`?
pub struct ContainsLinksInInstruction;

impl Instruction for ContainsLinksInInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::ContainsLinksIn
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Variadic
    }

    fn capabilities(&self) -> Capabilities {
        CALC_BOOL | RESULT
    }

    fn calculate_bool(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Option<bool> {
        if too_few(self.opcode(), args, 2) {
            return None;
        }
        let target = solve_single_result(brain, proc, args[0])?;
        let cell = brain.get(target)?;
        let id = cell.id();
        let set = brain.locks().lock(cell, Aspect::EdgesIn, false);
        let edges = set.edges_in(id)?;
        Some(args[1..].iter().all(|&m| edges.contains_meaning(m)))
    }

    fn get_value(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Vec<NeuronId> {
        let v = self.calculate_bool(brain, proc, args).unwrap_or(false);
        vec![bool_neuron(brain, v)]
    }
}

/// Is `args[0]` a child of every cluster in `args[1..]`?
pub struct IsClusteredByInstruction;

impl Instruction for IsClusteredByInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::IsClusteredBy
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Variadic
    }

    fn capabilities(&self) -> Capabilities {
        CALC_BOOL | RESULT
    }

    fn calculate_bool(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Option<bool> {
        if too_few(self.opcode(), args, 2) {
            return None;
        }
        let target = solve_single_result(brain, proc, args[0])?;
        let cell = brain.get(target)?;
        let owners = cell.clustered_by_snapshot();
        Some(args[1..].iter().all(|c| owners.contains(c)))
    }

    fn get_value(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Vec<NeuronId> {
        let v = self.calculate_bool(brain, proc, args).unwrap_or(false);
        vec![bool_neuron(brain, v)]
    }
}

/// Does cluster `args[0]` contain child `args[1]`?
pub struct ContainsChildInstruction;

impl Instruction for ContainsChildInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::ContainsChild
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(2)
    }

    fn capabilities(&self) -> Capabilities {
        CALC_BOOL | RESULT
    }

    fn calculate_bool(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Option<bool> {
        let cluster = solve_single_result(brain, proc, args[0])?;
        let child = solve_single_result(brain, proc, args[1])?;
        let cell = brain.get(cluster)?;
        let id = cell.id();
        let set = brain.locks().lock(cell, Aspect::Children, false);
        let data = set.children(id)?;
        Some(data.children.contains(child))
    }

    fn get_value(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Vec<NeuronId> {
        let v = self.calculate_bool(brain, proc, args).unwrap_or(false);
        vec![bool_neuron(brain, v)]
    }
}

/// Does cluster `args[0]` contain every child in `args[1..]`?
///
/// One lock acquisition covers the whole batch — the work happens against
/// the guarded view, not via repeated single-child lookups.
pub struct ContainsAllChildrenInstruction;

impl Instruction for ContainsAllChildrenInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::ContainsAllChildren
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Variadic
    }

    fn capabilities(&self) -> Capabilities {
        CALC_BOOL | RESULT
    }

    fn calculate_bool(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Option<bool> {
        if too_few(self.opcode(), args, 2) {
            return None;
        }
        let cluster = solve_single_result(brain, proc, args[0])?;
        let cell = brain.get(cluster)?;
        let id = cell.id();
        let set = brain.locks().lock(cell, Aspect::Children, false);
        let data = set.children(id)?;
        Some(args[1..].iter().all(|&c| data.children.contains(c)))
    }

    fn get_value(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Vec<NeuronId> {
        let v = self.calculate_bool(brain, proc, args).unwrap_or(false);
        vec![bool_neuron(brain, v)]
    }
}
