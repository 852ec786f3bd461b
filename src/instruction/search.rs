//! First-match search instructions over edge sets and cluster membership.

use super::{solve_single_result, ArgCount, Capabilities, Instruction, Opcode, RESULT};
use crate::brain::Brain;
use crate::entity::NeuronId;
use crate::processor::Processor;
use std::sync::Arc;

/// Target of the first outgoing link of `args[0]` with meaning `args[1]`.
pub struct GetFirstOutInstruction;

impl Instruction for GetFirstOutInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::GetFirstOut
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(2)
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
        let Some(target) = solve_single_result(brain, proc, args[0]) else {
            return Vec::new();
        };
        let Some(meaning) = solve_single_result(brain, proc, args[1]) else {
            return Vec::new();
        };
        brain
            .find_first_out(target, meaning)
            .map(|id| vec![id])
            .unwrap_or_default()
    }
}

/// Source of the first incoming link of `args[0]` with meaning `args[1]`.
pub struct GetFirstInInstruction;

impl Instruction for GetFirstInInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::GetFirstIn
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(2)
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
        let Some(target) = solve_single_result(brain, proc, args[0]) else {
            return Vec::new();
        };
        let Some(meaning) = solve_single_result(brain, proc, args[1]) else {
            return Vec::new();
        };
        brain
            .find_first_in(target, meaning)
            .map(|id| vec![id])
            .unwrap_or_default()
    }
}

/// First cluster containing `args[0]` whose meaning is `args[1]`.
pub struct GetFirstClusteredByInstruction;

impl Instruction for GetFirstClusteredByInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::GetFirstClusteredBy
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(2)
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
        let Some(target) = solve_single_result(brain, proc, args[0]) else {
            return Vec::new();
        };
        let Some(meaning) = solve_single_result(brain, proc, args[1]) else {
            return Vec::new();
        };
        brain
            .find_first_clustered_by(target, meaning)
            .map(|id| vec![id])
            .unwrap_or_default()
    }
}
