//! Call frame for method invocations

use std::ops::Range;

use bytecode_system::MethodDescriptor;
use core_types::{Value, VmError};

/// One active method invocation.
///
/// Locals and operands own the counts of the values they hold; a frame must
/// be emptied through [`CallFrame::drain`] before it is dropped.
#[derive(Debug, PartialEq)]
pub struct CallFrame {
    /// Method table index of the running method
    pub method_index: u16,
    /// Offset of the next instruction within the method body
    pub ip: usize,
    /// Caller offset to resume at, `None` for the outermost frame
    pub return_address: Option<usize>,
    code: Range<usize>,
    locals: Vec<Value>,
    stack: Vec<Value>,
    max_stack: usize,
}

impl CallFrame {
    /// Create a frame with every local unset and an empty operand stack.
    pub fn new(method_index: u16, method: &MethodDescriptor, return_address: Option<usize>) -> Self {
        let max_stack = usize::from(method.max_stack);
        Self {
            method_index,
            ip: 0,
            return_address,
            code: method.code_range(),
            locals: (0..method.frame_locals()).map(|_| Value::Uninitialized).collect(),
            stack: Vec::with_capacity(max_stack),
            max_stack,
        }
    }

    /// Byte range of the method body in the shared bytecode buffer
    pub fn code_range(&self) -> Range<usize> {
        self.code.clone()
    }

    /// Length of the method body
    pub fn code_len(&self) -> usize {
        self.code.len()
    }

    /// Push an operand, handing it back when the stack is full.
    pub fn push(&mut self, value: Value) -> Result<(), Value> {
        if self.stack.len() >= self.max_stack {
            return Err(value);
        }
        self.stack.push(value);
        Ok(())
    }

    /// Pop the top operand.
    pub fn pop(&mut self) -> Result<Value, VmError> {
        self.stack.pop().ok_or(VmError::OperandStackUnderflow)
    }

    /// Pop the top `N` operands, deepest first. Nothing is popped when fewer
    /// than `N` are present.
    pub fn pop_n<const N: usize>(&mut self) -> Result<[Value; N], VmError> {
        let mut popped = self.pop_many(N)?.into_iter();
        Ok(std::array::from_fn(|_| {
            popped.next().unwrap_or(Value::Uninitialized)
        }))
    }

    /// Pop the top `count` operands, deepest first.
    pub fn pop_many(&mut self, count: usize) -> Result<Vec<Value>, VmError> {
        let split = self
            .stack
            .len()
            .checked_sub(count)
            .ok_or(VmError::OperandStackUnderflow)?;
        Ok(self.stack.split_off(split))
    }

    /// Operand `depth` slots below the top (0 is the top).
    pub fn peek(&self, depth: usize) -> Result<&Value, VmError> {
        self.stack
            .len()
            .checked_sub(depth + 1)
            .and_then(|index| self.stack.get(index))
            .ok_or(VmError::OperandStackUnderflow)
    }

    /// Exchange the top two operands.
    pub fn swap(&mut self) -> Result<(), VmError> {
        let len = self.stack.len();
        if len < 2 {
            return Err(VmError::OperandStackUnderflow);
        }
        self.stack.swap(len - 1, len - 2);
        Ok(())
    }

    /// Number of operands on the stack
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Operand stack capacity
    pub fn max_stack(&self) -> usize {
        self.max_stack
    }

    /// Operands, deepest first
    pub fn operands(&self) -> &[Value] {
        &self.stack
    }

    /// Local slot `index`.
    pub fn local(&self, index: usize) -> Result<&Value, VmError> {
        self.locals.get(index).ok_or(VmError::InvalidLocal {
            index,
            count: self.locals.len(),
        })
    }

    /// Mutable local slot `index`.
    pub fn local_mut(&mut self, index: usize) -> Result<&mut Value, VmError> {
        let count = self.locals.len();
        self.locals
            .get_mut(index)
            .ok_or(VmError::InvalidLocal { index, count })
    }

    /// Number of local slots
    pub fn local_count(&self) -> usize {
        self.locals.len()
    }

    /// Move `args` into the lowest locals, first argument in slot 0.
    pub(crate) fn bind_arguments(&mut self, args: Vec<Value>) {
        for (slot, arg) in self.locals.iter_mut().zip(args) {
            *slot = arg;
        }
    }

    /// Take every local and operand out of the frame.
    pub fn drain(&mut self) -> impl Iterator<Item = Value> + '_ {
        self.locals.drain(..).chain(self.stack.drain(..))
    }
}
