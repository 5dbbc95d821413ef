//! Arithmetic and comparison helpers shared by the dispatch loop
//!
//! Every numeric opcode is one call to [`Vm::binary_op`] or [`Vm::unary_op`]
//! with the payload types spelled out; unboxing, releasing the operands and
//! boxing the result happen here.

use std::io::Write;

use bytecode_system::Opcode;
use core_types::VmError;
use memory_manager::Boxed;

use crate::vm::Vm;

impl<W: Write> Vm<W> {
    /// Pop two boxes, apply `op` to their payloads and push the boxed
    /// result. Both operands are released even when `op` fails.
    pub(crate) fn binary_op<T, R>(
        &mut self,
        op: impl FnOnce(T, T) -> Result<R, VmError>,
    ) -> Result<(), VmError>
    where
        T: Boxed,
        R: Boxed,
    {
        let [lhs, rhs] = self.pop_n()?;
        let operands = T::unboxed(&self.heap, &lhs)
            .and_then(|a| T::unboxed(&self.heap, &rhs).map(|b| (a, b)));
        self.discard([lhs, rhs]);
        let (a, b) = operands?;
        self.push_boxed(op(a, b)?)
    }

    /// Pop one box, apply `op` and push the boxed result.
    pub(crate) fn unary_op<T, R>(&mut self, op: impl FnOnce(T) -> R) -> Result<(), VmError>
    where
        T: Boxed,
        R: Boxed,
    {
        let operand = self.pop_boxed::<T>()?;
        self.push_boxed(op(operand))
    }

    /// Pop two integers for an `if_icmp*` branch.
    pub(crate) fn pop_int_pair(&mut self) -> Result<(i32, i32), VmError> {
        let [lhs, rhs] = self.pop_n()?;
        let pair = self
            .heap
            .unbox_int(&lhs)
            .and_then(|a| self.heap.unbox_int(&rhs).map(|b| (a, b)));
        self.discard([lhs, rhs]);
        pair
    }
}

pub(crate) fn divide(a: i32, b: i32) -> Result<i32, VmError> {
    if b == 0 {
        return Err(VmError::DivisionByZero);
    }
    Ok(a.wrapping_div(b))
}

pub(crate) fn remainder(a: i32, b: i32) -> Result<i32, VmError> {
    if b == 0 {
        return Err(VmError::DivisionByZero);
    }
    Ok(a.wrapping_rem(b))
}

/// -1, 0 or 1; unordered floats compare as -1.
pub(crate) fn float_compare(a: f32, b: f32) -> i32 {
    a.partial_cmp(&b).map_or(-1, |ordering| ordering as i32)
}

/// Whether a conditional integer branch is taken. The single-operand forms
/// compare against zero.
pub(crate) fn condition(opcode: Opcode, a: i32, b: i32) -> bool {
    match opcode {
        Opcode::Ifeq | Opcode::IfIcmpeq => a == b,
        Opcode::Ifne | Opcode::IfIcmpne => a != b,
        Opcode::Iflt | Opcode::IfIcmplt => a < b,
        Opcode::Ifge | Opcode::IfIcmpge => a >= b,
        Opcode::Ifgt | Opcode::IfIcmpgt => a > b,
        Opcode::Ifle | Opcode::IfIcmple => a <= b,
        _ => false,
    }
}
