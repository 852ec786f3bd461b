//! Arithmetic instructions.
//!
//! Each exposes the fast-path `calculate_*` over already-resolved operands
//! and a `get_value` that freezes the result into a temp neuron. Integer
//! arithmetic wraps on overflow; division or modulo by zero is a defined
//! error path: logged, neutral zero result.

use super::{
    double_of, freeze_double, freeze_int, int_of, ArgCount, Capabilities, Instruction, Opcode,
    CALC_DOUBLE, CALC_INT, RESULT,
};
use crate::brain::Brain;
use crate::entity::NeuronId;
use crate::processor::Processor;
use std::sync::Arc;

fn ints(brain: &Arc<Brain>, proc: &mut Processor, args: &[NeuronId]) -> Option<Vec<i64>> {
    args.iter().map(|&a| int_of(brain, proc, a)).collect()
}

fn doubles(brain: &Arc<Brain>, proc: &mut Processor, args: &[NeuronId]) -> Option<Vec<f64>> {
    args.iter().map(|&a| double_of(brain, proc, a)).collect()
}

// ============================================================================
// INTEGER ARITHMETIC
// ============================================================================

/// Sum of all integer arguments.
pub struct AddIntInstruction;

impl Instruction for AddIntInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::AddInt
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Variadic
    }

    fn capabilities(&self) -> Capabilities {
        CALC_INT | RESULT
    }

    fn calculate_int(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Option<i64> {
        Some(
            ints(brain, proc, args)?
                .into_iter()
                .fold(0i64, i64::wrapping_add),
        )
    }

    fn get_value(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Vec<NeuronId> {
        let v = self.calculate_int(brain, proc, args).unwrap_or(0);
        vec![freeze_int(brain, proc, v)]
    }
}

/// `args[0] - args[1]`.
pub struct MinusIntInstruction;

impl Instruction for MinusIntInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::MinusInt
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(2)
    }

    fn capabilities(&self) -> Capabilities {
        CALC_INT | RESULT
    }

    fn calculate_int(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Option<i64> {
        let vals = ints(brain, proc, args)?;
        Some(vals[0].wrapping_sub(vals[1]))
    }

    fn get_value(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Vec<NeuronId> {
        let v = self.calculate_int(brain, proc, args).unwrap_or(0);
        vec![freeze_int(brain, proc, v)]
    }
}

/// Product of all integer arguments.
pub struct MultiplyIntInstruction;

impl Instruction for MultiplyIntInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::MultiplyInt
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Variadic
    }

    fn capabilities(&self) -> Capabilities {
        CALC_INT | RESULT
    }

    fn calculate_int(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Option<i64> {
        Some(
            ints(brain, proc, args)?
                .into_iter()
                .fold(1i64, i64::wrapping_mul),
        )
    }

    fn get_value(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Vec<NeuronId> {
        let v = self.calculate_int(brain, proc, args).unwrap_or(1);
        vec![freeze_int(brain, proc, v)]
    }
}

/// `args[0] / args[1]`. Division by zero logs and yields zero.
pub struct DivIntInstruction;

impl Instruction for DivIntInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::DivInt
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(2)
    }

    fn capabilities(&self) -> Capabilities {
        CALC_INT | RESULT
    }

    fn calculate_int(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Option<i64> {
        let vals = ints(brain, proc, args)?;
        if vals[1] == 0 {
            tracing::error!("integer division by zero");
            return None;
        }
        Some(vals[0].wrapping_div(vals[1]))
    }

    fn get_value(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Vec<NeuronId> {
        let v = self.calculate_int(brain, proc, args).unwrap_or(0);
        vec![freeze_int(brain, proc, v)]
    }
}

/// `args[0] % args[1]`. Modulo by zero logs and yields zero.
pub struct ModIntInstruction;

impl Instruction for ModIntInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::ModInt
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(2)
    }

    fn capabilities(&self) -> Capabilities {
        CALC_INT | RESULT
    }

    fn calculate_int(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Option<i64> {
        let vals = ints(brain, proc, args)?;
        if vals[1] == 0 {
            tracing::error!("integer modulo by zero");
            return None;
        }
        Some(vals[0].wrapping_rem(vals[1]))
    }

    fn get_value(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Vec<NeuronId> {
        let v = self.calculate_int(brain, proc, args).unwrap_or(0);
        vec![freeze_int(brain, proc, v)]
    }
}

// ============================================================================
// FLOATING ARITHMETIC
// ============================================================================

/// Sum of all floating arguments (ints widen).
pub struct AddDoubleInstruction;

impl Instruction for AddDoubleInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::AddDouble
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Variadic
    }

    fn capabilities(&self) -> Capabilities {
        CALC_DOUBLE | RESULT
    }

    fn calculate_double(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Option<f64> {
        Some(doubles(brain, proc, args)?.iter().sum())
    }

    fn get_value(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Vec<NeuronId> {
        let v = self.calculate_double(brain, proc, args).unwrap_or(0.0);
        vec![freeze_double(brain, proc, v)]
    }
}

/// `args[0] - args[1]` on doubles.
pub struct MinusDoubleInstruction;

impl Instruction for MinusDoubleInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::MinusDouble
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(2)
    }

    fn capabilities(&self) -> Capabilities {
        CALC_DOUBLE | RESULT
    }

    fn calculate_double(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Option<f64> {
        let vals = doubles(brain, proc, args)?;
        Some(vals[0] - vals[1])
    }

    fn get_value(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Vec<NeuronId> {
        let v = self.calculate_double(brain, proc, args).unwrap_or(0.0);
        vec![freeze_double(brain, proc, v)]
    }
}

/// Product of all floating arguments.
pub struct MultiplyDoubleInstruction;

impl Instruction for MultiplyDoubleInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::MultiplyDouble
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Variadic
    }

    fn capabilities(&self) -> Capabilities {
        CALC_DOUBLE | RESULT
    }

    fn calculate_double(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Option<f64> {
        Some(doubles(brain, proc, args)?.iter().product())
    }

    fn get_value(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Vec<NeuronId> {
        let v = self.calculate_double(brain, proc, args).unwrap_or(1.0);
        vec![freeze_double(brain, proc, v)]
    }
}

/// `args[0] / args[1]` on doubles. Zero divisor logs and yields zero.
pub struct DivDoubleInstruction;

impl Instruction for DivDoubleInstruction {
    fn opcode(&self) -> Opcode {
        Opcode::DivDouble
    }

    fn arg_count(&self) -> ArgCount {
        ArgCount::Exact(2)
    }

    fn capabilities(&self) -> Capabilities {
        CALC_DOUBLE | RESULT
    }

    fn calculate_double(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Option<f64> {
        let vals = doubles(brain, proc, args)?;
        if vals[1] == 0.0 {
            tracing::error!("floating division by zero");
            return None;
        }
        Some(vals[0] / vals[1])
    }

    fn get_value(
        &self,
        brain: &Arc<Brain>,
        proc: &mut Processor,
        args: &[NeuronId],
    ) -> Vec<NeuronId> {
        let v = self.calculate_double(brain, proc, args).unwrap_or(0.0);
        vec![freeze_double(brain, proc, v)]
    }
}
