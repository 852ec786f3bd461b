//! Control-flow instructions: calls, jumps, blocked child evaluation and
//! the suspend/awake protocol.

use super::{
    bool_of, int_of, solve_single_result, ArgCount, Capabilities, Instruction, Opcode, RESULT,
    STATEMENT,
};
use crate::brain::Brain;
use crate::entity::{NeuronId, NeuronKind};
use crate::processor::{Processor, ProcessorState};
use std::sync::Arc;

// ============================================================================
// CALLS AND JUMPS
// ============================================================================

/// Push the argument cluster's instruction list as a new call frame.
pub struct CallInstruction;

impl Instruction for CallInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::Call
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(1)
    }

    fn capabilities(&self) -> Capabilities {
        STATEMENT
    }

    fn execute(&self, brain: &Arc<Brain>, proc: &mut Processor, args: &[NeuronId]) {
        if let Some(cluster) = solve_single_result(brain, proc, args[0]) {
            proc.push_call(brain, cluster, None);
        }
    }
}

/// Like `Call`, but the new frame owns a variable scope. The scope shares
/// the enclosing bindings except for the variables passed as `args[1..]`,
/// which start fresh and shadow the caller's.
pub struct CallSaveInstruction;

impl Instruction for CallSaveInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::CallSave
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Variadic
    }

    fn capabilities(&self) -> Capabilities {
        STATEMENT
    }

    fn execute(&self, brain: &Arc<Brain>, proc: &mut Processor, args: &[NeuronId]) {
        if args.is_empty() {
            tracing::error!("CallSave needs a cluster argument");
            return;
        }
        let Some(cluster) = solve_single_result(brain, proc, args[0]) else {
            return;
        };
        let mut fresh = Vec::with_capacity(args.len() - 1);
        for &var in &args[1..] {
            match brain.get(var) {
                Some(cell) if cell.kind() == NeuronKind::Variable => fresh.push(var),
                _ => {
                    tracing::error!(neuron = %var, "CallSave argument is not a variable; skipped");
                }
            }
        }
        proc.push_call(brain, cluster, Some(&fresh));
    }
}

/// Conditional jump: when `args[0]` is true, move the current frame's
/// program counter to the index named by `args[1]`.
pub struct JmpIfInstruction;

impl Instruction for JmpIfInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::JmpIf
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(2)
    }

    fn capabilities(&self) -> Capabilities {
        STATEMENT
    }

    fn execute(&self, brain: &Arc<Brain>, proc: &mut Processor, args: &[NeuronId]) {
        let Some(condition) = bool_of(brain, proc, args[0]) else {
            return;
        };
        if !condition {
            return;
        }
        let Some(target) = int_of(brain, proc, args[1]) else {
            return;
        };
        match usize::try_from(target) {
            Ok(target) => proc.jump(target),
            Err(_) => tracing::error!(target, "negative jump target"),
        }
    }
}

/// End the current frame early.
pub struct ExitFrameInstruction;

impl Instruction for ExitFrameInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::ExitFrame
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(0)
    }

    fn capabilities(&self) -> Capabilities {
        STATEMENT
    }

    fn execute(&self, _brain: &Arc<Brain>, proc: &mut Processor, _args: &[NeuronId]) {
        proc.exit_frame();
    }
}

// ============================================================================
// BLOCKED CHILD EVALUATION
// ============================================================================

fn run_child(brain: &Arc<Brain>, proc: &mut Processor, cluster: NeuronId) -> Vec<NeuronId> {
    proc.set_state(ProcessorState::Blocked);
    let mut child = Processor::new();
    // The child runs on this thread, so it shares its slot ownership.
    child.set_holds_slot(proc.holds_slot());
    let results = if child.push_call(brain, cluster, None) {
        child.run(brain);
        child.take_staged()
    } else {
        Vec::new()
    };
    if child.pass_frozen() {
        proc.adopt_frozen(child.take_frozen());
    } else {
        child.discard_frozen(brain);
    }
    proc.set_state(ProcessorState::Running);
    results
}

/// Run a cluster in a child processor on the current thread, waiting for it
/// to complete. Results are discarded.
pub struct BlockedCallInstruction;

impl Instruction for BlockedCallInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::BlockedCall
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(1)
    }

    fn capabilities(&self) -> Capabilities {
        STATEMENT
    }

    fn execute(&self, brain: &Arc<Brain>, proc: &mut Processor, args: &[NeuronId]) {
        if let Some(cluster) = solve_single_result(brain, proc, args[0]) {
            run_child(brain, proc, cluster);
        }
    }
}

/// Run a cluster in a child processor and stage its results into the
/// caller. Unless the child ran `PassFrozenToCaller`, its temp results are
/// collected at completion and the staged ids may already be gone.
pub struct BlockedSolveInstruction;

impl Instruction for BlockedSolveInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::BlockedSolve
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
        match solve_single_result(brain, proc, args[0]) {
            Some(cluster) => run_child(brain, proc, cluster),
            None => Vec::new(),
        }
    }
}

/// Transfer ownership of this processor's frozen temp neurons to its caller
/// at completion, instead of collecting them.
pub struct PassFrozenToCallerInstruction;

impl Instruction for PassFrozenToCallerInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::PassFrozenToCaller
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(0)
    }

    fn capabilities(&self) -> Capabilities {
        STATEMENT
    }

    fn execute(&self, _brain: &Arc<Brain>, proc: &mut Processor, _args: &[NeuronId]) {
        proc.set_pass_frozen();
    }
}

// ============================================================================
// SUSPEND / AWAKE
// ============================================================================

/// Park this processor on an indicator neuron: register the indicator and
/// attach it to the target cluster as one atomic step, release the
/// scheduler slot (when one is held) and wait. A duplicate registration
/// refuses the whole instruction.
pub struct SuspendInstruction;

impl Instruction for SuspendInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::Suspend
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
        let Some(indicator) = solve_single_result(brain, proc, args[1]) else {
            return;
        };
        let handle = match brain.register_suspension(cluster, indicator) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(indicator = %indicator, error = %e, "suspend refused");
                return;
            }
        };
        proc.set_state(ProcessorState::Suspended);
        if proc.holds_slot() {
            brain.scheduler().release_slot();
        }
        handle.wait();
        if proc.holds_slot() {
            brain.scheduler().acquire_resume_slot();
        }
        proc.set_state(ProcessorState::Running);
    }
}

/// Resume the processor parked on an indicator neuron: detach the indicator
/// from the cluster, take the registration and signal its wait handle. No
/// registration means nothing to awake, and the cluster stays untouched.
pub struct AwakeInstruction;

impl Instruction for AwakeInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::Awake
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
        let Some(indicator) = solve_single_result(brain, proc, args[1]) else {
            return;
        };
        match brain.awake_suspension(cluster, indicator) {
            Some(handle) => handle.signal(),
            None => {
                tracing::debug!(indicator = %indicator, "nothing suspended on indicator");
            }
        }
    }
}
