//! Instruction set and dispatch.
//!
//! Every instruction is polymorphic over a small capability set: arity
//! declaration, direct value calculation (`calculate_int` / `calculate_bool`
//! / `calculate_double`), result production (`get_value`) and statement
//! execution (`execute`). Dispatch checks the capability bits instead of
//! downcasting.
//!
//! An *expression* is a cluster neuron whose meaning names an instruction
//! neuron and whose children are the argument ids. Operand loading happens
//! before any lock is taken; mutating instructions lock exactly the entities
//! they touch, mutate under lock, and fire their change notification only
//! after the lock region is released.
//!
//! Failure policy: argument-count or argument-type mismatches are logged and
//! resolve to a neutral result (zero / false / nothing) so a single malformed
//! instruction never aborts a run. Only lock/suspension contract violations
//! are treated as defects.

mod arith;
mod compare;
mod flow;
mod membership;
mod mutate;
mod output;
mod search;

use crate::brain::Brain;
use crate::entity::{NeuronId, NeuronKind};
use crate::processor::Processor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// CAPABILITIES
// ============================================================================

/// Capability bit-set an instruction declares.
pub type Capabilities = u8;

/// Direct integer calculation (`calculate_int`).
pub const CALC_INT: Capabilities = 1 << 0;
/// Direct floating calculation (`calculate_double`).
pub const CALC_DOUBLE: Capabilities = 1 << 1;
/// Direct boolean calculation (`calculate_bool`).
pub const CALC_BOOL: Capabilities = 1 << 2;
/// Produces result neurons (`get_value`).
pub const RESULT: Capabilities = 1 << 3;
/// Executable as a statement (`execute`).
pub const STATEMENT: Capabilities = 1 << 4;

/// Declared arity of an instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ArgCount {
    Exact(usize),
    Variadic,
}

// ============================================================================
// OPCODES
// ============================================================================

/// Identifies every shipped instruction. Stored on instruction neurons.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Opcode {
    // arithmetic
    AddInt,
    MinusInt,
    MultiplyInt,
    DivInt,
    ModInt,
    AddDouble,
    MinusDouble,
    MultiplyDouble,
    DivDouble,
    // comparison
    Equal,
    Smaller,
    Bigger,
    // membership
    ContainsLinksOut,
    ContainsLinksIn,
    IsClusteredBy,
    ContainsChild,
    ContainsAllChildren,
    // search
    GetFirstOut,
    GetFirstIn,
    GetFirstClusteredBy,
    // graph mutation
    New,
    Delete,
    MakeTemp,
    AddLink,
    RemoveLink,
    AddChild,
    InsertChild,
    RemoveChild,
    RemoveChildAt,
    MoveChild,
    AddInfo,
    RemoveInfoAt,
    StoreInt,
    StoreValue,
    // control flow
    Call,
    CallSave,
    JmpIf,
    ExitFrame,
    BlockedCall,
    BlockedSolve,
    PassFrozenToCaller,
    Suspend,
    Awake,
    // output
    Output,
}

// ============================================================================
// INSTRUCTION TRAIT
// ============================================================================

/// One instruction. Implementations override only the entry points their
/// capability bits advertise; the rest stay at their neutral defaults.
pub trait Instruction: Send + Sync {
    fn opcode(&self) -> Opcode;

    /// Required argument count; `Variadic` accepts any.
    fn arg_count(&self) -> ArgCount;

    fn capabilities(&self) -> Capabilities;

    /// Fast-path integer calculation over already-resolved arguments.
    fn calculate_int(
        &self,
        _brain: &Arc<Brain>,
        _proc: &mut Processor,
        _args: &[NeuronId],
    ) -> Option<i64> {
        None
    }

    fn calculate_double(
        &self,
        _brain: &Arc<Brain>,
        _proc: &mut Processor,
        _args: &[NeuronId],
    ) -> Option<f64> {
        None
    }

    fn calculate_bool(
        &self,
        _brain: &Arc<Brain>,
        _proc: &mut Processor,
        _args: &[NeuronId],
    ) -> Option<bool> {
        None
    }

    /// Evaluate to result neurons.
    fn get_value(
        &self,
        _brain: &Arc<Brain>,
        _proc: &mut Processor,
        _args: &[NeuronId],
    ) -> Vec<NeuronId> {
        Vec::new()
    }

    /// Execute as a statement.
    fn execute(&self, _brain: &Arc<Brain>, _proc: &mut Processor, _args: &[NeuronId]) {}
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Opcode → instruction table. Built once per brain.
pub struct InstructionSet {
    table: HashMap<Opcode, Box<dyn Instruction>>,
}

impl InstructionSet {
    pub fn new() -> Self {
        let mut table: HashMap<Opcode, Box<dyn Instruction>> = HashMap::new();
        let entries: Vec<Box<dyn Instruction>> = vec![
            Box::new(arith::AddIntInstruction),
            Box::new(arith::MinusIntInstruction),
            Box::new(arith::MultiplyIntInstruction),
            Box::new(arith::DivIntInstruction),
            Box::new(arith::ModIntInstruction),
            Box::new(arith::AddDoubleInstruction),
            Box::new(arith::MinusDoubleInstruction),
            Box::new(arith::MultiplyDoubleInstruction),
            Box::new(arith::DivDoubleInstruction),
            Box::new(compare::EqualInstruction),
            Box::new(compare::SmallerInstruction),
            Box::new(compare::BiggerInstruction),
            Box::new(membership::ContainsLinksOutInstruction),
            Box::new(membership::ContainsLinksInInstruction),
            Box::new(membership::IsClusteredByInstruction),
            Box::new(membership::ContainsChildInstruction),
            Box::new(membership::ContainsAllChildrenInstruction),
            Box::new(search::GetFirstOutInstruction),
            Box::new(search::GetFirstInInstruction),
            Box::new(search::GetFirstClusteredByInstruction),
            Box::new(mutate::NewInstruction),
            Box::new(mutate::DeleteInstruction),
            Box::new(mutate::MakeTempInstruction),
            Box::new(mutate::AddLinkInstruction),
            Box::new(mutate::RemoveLinkInstruction),
            Box::new(mutate::AddChildInstruction),
            Box::new(mutate::InsertChildInstruction),
            Box::new(mutate::RemoveChildInstruction),
            Box::new(mutate::RemoveChildAtInstruction),
            Box::new(mutate::MoveChildInstruction),
            Box::new(mutate::AddInfoInstruction),
            Box::new(mutate::RemoveInfoAtInstruction),
            Box::new(mutate::StoreIntInstruction),
            Box::new(mutate::StoreValueInstruction),
            Box::new(flow::CallInstruction),
            Box::new(flow::CallSaveInstruction),
            Box::new(flow::JmpIfInstruction),
            Box::new(flow::ExitFrameInstruction),
            Box::new(flow::BlockedCallInstruction),
            Box::new(flow::BlockedSolveInstruction),
            Box::new(flow::PassFrozenToCallerInstruction),
            Box::new(flow::SuspendInstruction),
            Box::new(flow::AwakeInstruction),
            Box::new(output::OutputInstruction),
        ];
        for entry in entries {
            table.insert(entry.opcode(), entry);
        }
        Self { table }
    }

    pub fn get(&self, op: Opcode) -> Option<&dyn Instruction> {
        self.table.get(&op).map(|b| &**b)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for InstructionSet {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// DISPATCH
// ============================================================================

/// Decode an expression neuron into its opcode and raw argument list.
///
/// Accepts either a bare instruction neuron (zero args) or a cluster whose
/// meaning is an instruction neuron. This is the operand preload: the code is
/// fully read before any instruction takes a lock.
pub(crate) fn decode(brain: &Arc<Brain>, expr: NeuronId) -> Option<(Opcode, Vec<NeuronId>)> {
    let cell = brain.get(expr)?;
    match cell.kind() {
        NeuronKind::Instruction => cell.opcode().map(|op| (op, Vec::new())),
        NeuronKind::Cluster => {
            let (meaning, children) = cell.cluster_snapshot()?;
            let meaning_cell = brain.get(meaning)?;
            let op = meaning_cell.opcode()?;
            Some((op, children))
        }
        _ => None,
    }
}

/// Arity validation. Logs and returns false on mismatch so the caller can
/// fall through to the neutral result.
pub(crate) fn check_args(instr: &dyn Instruction, args: &[NeuronId]) -> bool {
    match instr.arg_count() {
        ArgCount::Variadic => true,
        ArgCount::Exact(n) if args.len() == n => true,
        ArgCount::Exact(n) => {
            tracing::error!(
                opcode = ?instr.opcode(),
                expected = n,
                got = args.len(),
                "argument count mismatch; instruction skipped"
            );
            false
        }
    }
}

/// Execute one expression in a processor's current frame.
pub(crate) fn execute_expression(brain: &Arc<Brain>, proc: &mut Processor, expr: NeuronId) {
    let Some((op, args)) = decode(brain, expr) else {
        tracing::error!(expr = %expr, "neuron is not executable; skipped");
        return;
    };
    let Some(instr) = brain.instructions().get(op) else {
        tracing::error!(opcode = ?op, "no instruction registered; skipped");
        return;
    };
    if !check_args(instr, &args) {
        return;
    }
    let caps = instr.capabilities();
    if caps & STATEMENT != 0 {
        instr.execute(brain, proc, &args);
    } else if caps & RESULT != 0 {
        let results = instr.get_value(brain, proc, &args);
        proc.stage_results(results);
    } else {
        tracing::error!(opcode = ?op, "instruction is neither statement nor result-capable");
    }
}

/// Evaluate a sub-expression to its single result neuron.
///
/// Variables resolve to the head of their current binding; nested
/// result-capable expressions evaluate; everything else is already a value.
pub(crate) fn solve_single_result(
    brain: &Arc<Brain>,
    proc: &mut Processor,
    arg: NeuronId,
) -> Option<NeuronId> {
    let cell = brain.get(arg)?;
    match cell.kind() {
        NeuronKind::Variable => {
            let head = proc.variables().head(arg);
            if head.is_none() {
                tracing::debug!(variable = %arg, "unbound variable in expression");
            }
            head
        }
        NeuronKind::Cluster => {
            if let Some((op, args)) = decode(brain, arg) {
                if let Some(instr) = brain.instructions().get(op) {
                    if instr.capabilities() & RESULT != 0 && check_args(instr, &args) {
                        return instr.get_value(brain, proc, &args).into_iter().next();
                    }
                }
            }
            // A plain (non-expression) cluster is its own value.
            Some(arg)
        }
        _ => Some(arg),
    }
}

// ============================================================================
// TYPED ARGUMENT CONVERSION
// ============================================================================

/// Resolve an argument to an integer. Type mismatch is a logged error and
/// `None` — the caller substitutes its neutral result.
pub(crate) fn int_of(brain: &Arc<Brain>, proc: &mut Processor, arg: NeuronId) -> Option<i64> {
    let id = solve_single_result(brain, proc, arg)?;
    let cell = brain.get(id)?;
    match cell.value_snapshot().as_int() {
        Some(v) => Some(v),
        None => {
            tracing::error!(neuron = %id, kind = ?cell.kind(), "expected an int argument");
            None
        }
    }
}

/// Resolve an argument to a double (Int widens).
pub(crate) fn double_of(brain: &Arc<Brain>, proc: &mut Processor, arg: NeuronId) -> Option<f64> {
    let id = solve_single_result(brain, proc, arg)?;
    let cell = brain.get(id)?;
    match cell.value_snapshot().as_double() {
        Some(v) => Some(v),
        None => {
            tracing::error!(neuron = %id, kind = ?cell.kind(), "expected a numeric argument");
            None
        }
    }
}

/// Resolve an argument to a boolean: the well-known True/False neurons, or a
/// nonzero integer.
pub(crate) fn bool_of(brain: &Arc<Brain>, proc: &mut Processor, arg: NeuronId) -> Option<bool> {
    let id = solve_single_result(brain, proc, arg)?;
    if id == brain.true_id() {
        return Some(true);
    }
    if id == brain.false_id() {
        return Some(false);
    }
    let cell = brain.get(id)?;
    match cell.value_snapshot().as_int() {
        Some(v) => Some(v != 0),
        None => {
            tracing::error!(neuron = %id, "expected a boolean argument");
            None
        }
    }
}

// ============================================================================
// RESULT FREEZING
// ============================================================================

/// Wrap a computed integer into a temp result neuron owned by the processor's
/// frozen set.
pub(crate) fn freeze_int(brain: &Arc<Brain>, proc: &mut Processor, v: i64) -> NeuronId {
    let cell = brain.new_neuron(crate::entity::NeuronValue::Int(v));
    brain.make_temp(cell.id());
    proc.freeze(cell.id());
    cell.id()
}

pub(crate) fn freeze_double(brain: &Arc<Brain>, proc: &mut Processor, v: f64) -> NeuronId {
    let cell = brain.new_neuron(crate::entity::NeuronValue::Double(v));
    brain.make_temp(cell.id());
    proc.freeze(cell.id());
    cell.id()
}

/// Booleans map onto the shared True/False neurons; no temp is created.
pub(crate) fn bool_neuron(brain: &Arc<Brain>, v: bool) -> NeuronId {
    if v {
        brain.true_id()
    } else {
        brain.false_id()
    }
}
