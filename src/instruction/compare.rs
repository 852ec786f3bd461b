//! Comparison instructions. Results map onto the shared True/False neurons.

use super::{
    bool_neuron, solve_single_result, ArgCount, Capabilities, Instruction, Opcode, CALC_BOOL,
    RESULT,
};
use crate::brain::Brain;
use crate::entity::{NeuronId, NeuronValue};
use crate::processor::Processor;
use std::cmp::Ordering;
use std::sync::Arc;

/// Resolve both operands to values, then compare.
///
/// Numeric operands compare numerically (Int widens against Double), text
/// compares lexically. Mixed or non-comparable kinds log and yield `None`.
fn compare(
    brain: &Arc<Brain>,
    proc: &mut Processor,
    args: &[NeuronId],
) -> Option<Ordering> {
    let a = solve_single_result(brain, proc, args[0])?;
    let b = solve_single_result(brain, proc, args[1])?;
    if a == b {
        return Some(Ordering::Equal);
    }
    let va = brain.get(a)?.value_snapshot();
    let vb = brain.get(b)?.value_snapshot();
    match (&va, &vb) {
        (NeuronValue::Text(x), NeuronValue::Text(y)) => Some(x.cmp(y)),
        _ => {
            let (Some(x), Some(y)) = (va.as_double(), vb.as_double()) else {
                tracing::error!(left = %a, right = %b, "operands are not comparable");
                return None;
            };
            x.partial_cmp(&y)
        }
    }
}

fn bool_result(
    brain: &Arc<Brain>,
    proc: &mut Processor,
    args: &[NeuronId],
    instr: &dyn Instruction,
) -> Vec<NeuronId> {
    let v = instr.calculate_bool(brain, proc, args).unwrap_or(false);
    vec![bool_neuron(brain, v)]
}

/// Equality over resolved operands (identity or value).
pub struct EqualInstruction;

impl Instruction for EqualInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::Equal
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
        Some(compare(brain, proc, args)? == Ordering::Equal)
    }

    fn get_value(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Vec<NeuronId> {
        bool_result(brain, proc, args, self)
    }
}

/// `args[0] < args[1]`.
pub struct SmallerInstruction;

impl Instruction for SmallerInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::Smaller
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
        Some(compare(brain, proc, args)? == Ordering::Less)
    }

    fn get_value(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Vec<NeuronId> {
        bool_result(brain, proc, args, self)
    }
}

/// `args[0] > args[1]`.
pub struct BiggerInstruction;

impl Instruction for BiggerInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::Bigger
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
        Some(compare(brain, proc, args)? == Ordering::Greater)
    }

    fn get_value(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Vec<NeuronId> {
        bool_result(brain, proc, args, self)
    }
}
