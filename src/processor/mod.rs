//! Processor: the execution unit of the engine.
//!
//! A processor owns a call-frame stack, a variable-scope stack, an argument
//! staging stack and a frozen set of temp result neurons. It executes one
//! frame's instruction list in strict program order; `JmpIf` moves the
//! program counter, `Call`/`CallSave` push frames, and an emptied frame
//! stack completes the processor.
//!
//! ```text
//! Created ──▶ Running ──▶ Completed
//!                │ ▲
//!      Blocked ◀─┘ └─▶ Suspended
//! ```
//!
//! `Blocked` covers synchronous child evaluation on the same thread;
//! `Suspended` parks the thread on a wait handle until a matching awake.

mod scheduler;
mod suspension;
mod variables;

pub use scheduler::Scheduler;
pub use suspension::{SuspensionRegistry, WaitHandle};
pub use variables::VariableStack;

use crate::brain::Brain;
use crate::entity::NeuronId;
use crate::instruction::execute_expression;
use std::sync::Arc;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProcessorState {
    Created,
    Running,
    Blocked,
    Suspended,
    Completed,
}

/// One execution context: a cluster's instruction list and a program
/// counter into it.
pub struct CallFrame {
    pub cluster: NeuronId,
    code: Vec<NeuronId>,
    next_exp: usize,
    owns_scope: bool,
}

pub struct Processor {
    state: ProcessorState,
    frames: Vec<CallFrame>,
    variables: VariableStack,
    staged: Vec<Vec<NeuronId>>,
    frozen: Vec<NeuronId>,
    pass_frozen: bool,
    holds_slot: bool,
}

impl Processor {
    pub fn new() -> Self {
        Self {
            state: ProcessorState::Created,
            frames: Vec::new(),
            variables: VariableStack::new(),
            staged: vec![Vec::new()],
            frozen: Vec::new(),
            pass_frozen: false,
            holds_slot: false,
        }
    }

    #[inline]
    pub fn state(&self) -> ProcessorState {
        self.state
    }

    /// Whether this processor's thread occupies a scheduler slot. Only then
    /// does a suspension release and reacquire one.
    #[inline]
    pub fn holds_slot(&self) -> bool {
        self.holds_slot
    }

    pub fn set_holds_slot(&mut self, holds: bool) {
        self.holds_slot = holds;
    }

    pub(crate) fn set_state(&mut self, state: ProcessorState) {
        tracing::debug!(from = ?self.state, to = ?state, "processor state");
        self.state = state;
    }

    #[inline]
    pub fn variables(&self) -> &VariableStack {
        &self.variables
    }

    #[inline]
    pub fn variables_mut(&mut self) -> &mut VariableStack {
        &mut self.variables
    }

    #[inline]
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    // ========================================================================
    // FRAMES
    // ========================================================================

    /// Push a call frame for `cluster`'s instruction list. With
    /// `fresh_vars = Some(vars)` the frame also owns a new variable scope
    /// that shares the enclosing bindings except for `vars`, which start
    /// unbound. Returns false (logged) when `cluster` is not a cluster.
    pub fn push_call(
        &mut self,
        brain: &Arc<Brain>,
        cluster: NeuronId,
        fresh_vars: Option<&[NeuronId]>,
    ) -> bool {
        let Some(cell) = brain.get(cluster) else {
            tracing::error!(cluster = %cluster, "call target not found");
            return false;
        };
        let Some((_, code)) = cell.cluster_snapshot() else {
            tracing::error!(cluster = %cluster, "call target is not a cluster");
            return false;
        };
        let owns_scope = match fresh_vars {
            Some(vars) => {
                self.variables.push_shared(vars);
                true
            }
            None => false,
        };
        self.frames.push(CallFrame {
            cluster,
            code,
            next_exp: 0,
            owns_scope,
        });
        self.staged.push(Vec::new());
        true
    }

    /// Force the current frame to its end; it pops on the next loop turn.
    pub fn exit_frame(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.next_exp = frame.code.len();
        }
    }

    /// Move the current frame's program counter.
    pub fn jump(&mut self, target: usize) {
        if let Some(frame) = self.frames.last_mut() {
            if target > frame.code.len() {
                tracing::error!(
                    target,
                    len = frame.code.len(),
                    "jump target out of range; frame ends"
                );
                frame.next_exp = frame.code.len();
            } else {
                frame.next_exp = target;
            }
        }
    }

    fn pop_frame(&mut self) {
        if let Some(frame) = self.frames.pop() {
            tracing::debug!(cluster = %frame.cluster, depth = self.frames.len(), "frame popped");
            if frame.owns_scope {
                self.variables.pop();
            }
        }
        // The finished frame's staged results fall through to the caller.
        if self.staged.len() > 1 {
            let results = self.staged.pop().unwrap_or_default();
            if let Some(parent) = self.staged.last_mut() {
                parent.extend(results);
            }
        }
    }

    // ========================================================================
    // RESULT STAGING AND FROZEN SET
    // ========================================================================

    /// Append result neurons to the current staging list.
    pub fn stage_results(&mut self, results: Vec<NeuronId>) {
        if let Some(top) = self.staged.last_mut() {
            top.extend(results);
        }
    }

    /// Drain the current staging list.
    pub fn take_staged(&mut self) -> Vec<NeuronId> {
        self.staged.last_mut().map(std::mem::take).unwrap_or_default()
    }

    pub fn staged(&self) -> &[NeuronId] {
        self.staged.last().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Track a temp result neuron owned by this processor.
    pub fn freeze(&mut self, id: NeuronId) {
        self.frozen.push(id);
    }

    pub fn frozen(&self) -> &[NeuronId] {
        &self.frozen
    }

    pub fn take_frozen(&mut self) -> Vec<NeuronId> {
        std::mem::take(&mut self.frozen)
    }

    pub fn adopt_frozen(&mut self, ids: Vec<NeuronId>) {
        self.frozen.extend(ids);
    }

    /// Hand this processor's frozen neurons to the caller instead of
    /// deleting them at completion.
    pub fn set_pass_frozen(&mut self) {
        self.pass_frozen = true;
    }

    #[inline]
    pub fn pass_frozen(&self) -> bool {
        self.pass_frozen
    }

    // ========================================================================
    // RUN LOOP
    // ========================================================================

    /// Execute until the frame stack empties. Instructions run in program
    /// order; a suspension parks inside the instruction and execution
    /// continues here after the matching awake.
    pub fn run(&mut self, brain: &Arc<Brain>) {
        self.set_state(ProcessorState::Running);
        loop {
            let expr = {
                let Some(frame) = self.frames.last_mut() else {
                    break;
                };
                if frame.next_exp >= frame.code.len() {
                    self.pop_frame();
                    continue;
                }
                let expr = frame.code[frame.next_exp];
                frame.next_exp += 1;
                expr
            };
            execute_expression(brain, self, expr);
        }
        self.set_state(ProcessorState::Completed);
    }

    /// Delete this processor's frozen temp neurons unless they were passed
    /// to the caller. Runs at child-completion on the blocked-call path.
    pub(crate) fn discard_frozen(&mut self, brain: &Arc<Brain>) {
        if self.pass_frozen {
            return;
        }
        for id in self.take_frozen() {
            if let Err(e) = brain.delete(id) {
                tracing::debug!(neuron = %id, error = %e, "frozen neuron not collected");
            }
        }
    }
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}
