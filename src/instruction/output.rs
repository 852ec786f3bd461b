//! Sensory output.

use super::{solve_single_result, ArgCount, Capabilities, Instruction, Opcode, STATEMENT};
use crate::brain::Brain;
use crate::entity::{NeuronId, NeuronKind};
use crate::processor::Processor;
use std::sync::Arc;

/// Fan computed results out to the channel registered for a Sin neuron.
/// `args[0]` names the Sin; the remaining arguments resolve to the payload.
pub struct OutputInstruction;

impl Instruction for OutputInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::Output
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Variadic
    }

    fn capabilities(&self) -> Capabilities {
        STATEMENT
    }

    fn execute(&self, brain: &Arc<Brain>, proc: &mut Processor, args: &[NeuronId]) {
        if args.is_empty() {
            tracing::error!("Output needs a sin argument");
            return;
        }
        let sin = args[0];
        match brain.get(sin) {
            Some(cell) if cell.kind() == NeuronKind::Sin => {}
            _ => {
                tracing::error!(neuron = %sin, "Output target is not a sin");
                return;
            }
        }
        let mut payload = Vec::with_capacity(args.len() - 1);
        for &arg in &args[1..] {
            if let Some(id) = solve_single_result(brain, proc, arg) {
                payload.push(id);
            }
        }
        brain.sin_output(sin, &payload);
    }
}
