//! Program construction helpers
//!
//! [`CodeBuilder`] assembles one method body with forward/backward labels;
//! [`ProgramBuilder`] collects constants, classes and methods into a
//! [`ProgramImage`]. Used by tests and tooling; the interpreter only ever
//! sees the finished image.

use std::collections::HashMap;

use thiserror::Error;

use crate::constant::{Constant, ConstantPool};
use crate::opcode::Opcode;
use crate::program::{ClassDescriptor, Header, MethodDescriptor, ProgramImage, NO_SUPER_CLASS};

/// Errors raised while assembling a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A branch refers to a label that was never bound
    #[error("label {0} was never bound")]
    UnboundLabel(usize),

    /// A branch distance does not fit in 16 bits
    #[error("branch from {from} to {to} does not fit in a 16-bit offset")]
    BranchOutOfRange {
        /// Offset of the branch instruction
        from: usize,
        /// Label position
        to: usize,
    },

    /// Bytecode buffer exceeds the 16-bit offset space
    #[error("bytecode buffer of {0} bytes exceeds the addressable range")]
    CodeTooLarge(usize),

    /// A table outgrew its 16-bit index space
    #[error("{0} table is full")]
    TableFull(&'static str),
}

/// A branch target inside a [`CodeBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Assembles the bytecode of a single method.
///
/// ```
/// use bytecode_system::{CodeBuilder, Opcode};
///
/// let mut code = CodeBuilder::new();
/// let done = code.label();
/// code.op(Opcode::Load0).branch(Opcode::Ifeq, done).op(Opcode::Iconst1);
/// code.bind(done).op(Opcode::Ireturn);
/// assert_eq!(code.finish().unwrap().len(), 6);
/// ```
#[derive(Debug, Default)]
pub struct CodeBuilder {
    code: Vec<u8>,
    labels: Vec<Option<usize>>,
    fixups: Vec<(usize, Label)>,
}

impl CodeBuilder {
    /// Create an empty body
    pub fn new() -> Self {
        Self::default()
    }

    /// Current offset, i.e. where the next instruction starts.
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    /// Emit an operand-less instruction.
    pub fn op(&mut self, op: Opcode) -> &mut Self {
        self.code.push(op.byte());
        self
    }

    /// Emit an instruction with one unsigned byte.
    pub fn op_u8(&mut self, op: Opcode, operand: u8) -> &mut Self {
        self.code.extend_from_slice(&[op.byte(), operand]);
        self
    }

    /// Emit an instruction with one signed byte.
    pub fn op_i8(&mut self, op: Opcode, operand: i8) -> &mut Self {
        self.code.extend_from_slice(&[op.byte(), operand as u8]);
        self
    }

    /// Emit an instruction with one 16-bit index.
    pub fn op_u16(&mut self, op: Opcode, operand: u16) -> &mut Self {
        self.code.push(op.byte());
        self.code.extend_from_slice(&operand.to_le_bytes());
        self
    }

    /// Emit an instruction with one signed 16-bit immediate.
    pub fn op_i16(&mut self, op: Opcode, operand: i16) -> &mut Self {
        self.code.push(op.byte());
        self.code.extend_from_slice(&operand.to_le_bytes());
        self
    }

    /// Emit `invokevirtual`-shaped operands.
    pub fn op_u16_u8(&mut self, op: Opcode, index: u16, count: u8) -> &mut Self {
        self.op_u16(op, index);
        self.code.push(count);
        self
    }

    /// Emit `iinc`-shaped operands.
    pub fn op_u8_i8(&mut self, op: Opcode, slot: u8, delta: i8) -> &mut Self {
        self.code.extend_from_slice(&[op.byte(), slot, delta as u8]);
        self
    }

    /// Allocate an unbound label.
    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the current offset.
    pub fn bind(&mut self, label: Label) -> &mut Self {
        self.labels[label.0] = Some(self.code.len());
        self
    }

    /// Emit a branch to `label`; the offset is patched in [`finish`](Self::finish).
    pub fn branch(&mut self, op: Opcode, label: Label) -> &mut Self {
        self.fixups.push((self.code.len(), label));
        self.op_i16(op, 0)
    }

    /// Resolve branches and return the body.
    pub fn finish(mut self) -> Result<Vec<u8>, BuildError> {
        for &(at, label) in &self.fixups {
            let target = self.labels[label.0].ok_or(BuildError::UnboundLabel(label.0))?;
            let delta = i16::try_from(target as i64 - at as i64)
                .map_err(|_| BuildError::BranchOutOfRange { from: at, to: target })?;
            self.code[at + 1..at + 3].copy_from_slice(&delta.to_le_bytes());
        }
        Ok(self.code)
    }
}

/// Collects tables and bytecode into a [`ProgramImage`].
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    constants: ConstantPool,
    utf8_cache: HashMap<String, u16>,
    methods: Vec<MethodDescriptor>,
    classes: Vec<ClassDescriptor>,
    code: Vec<u8>,
    entry_point: u32,
}

impl ProgramBuilder {
    /// Create an empty program
    pub fn new() -> Self {
        Self::default()
    }

    fn push_constant(&mut self, constant: Constant) -> Result<u16, BuildError> {
        if self.constants.len() > usize::from(u16::MAX) {
            return Err(BuildError::TableFull("constant"));
        }
        Ok(self.constants.add(constant) as u16)
    }

    /// Intern a `Utf8` entry.
    pub fn utf8(&mut self, text: &str) -> Result<u16, BuildError> {
        if let Some(&index) = self.utf8_cache.get(text) {
            return Ok(index);
        }
        let index = self.push_constant(Constant::Utf8(text.as_bytes().to_vec()))?;
        self.utf8_cache.insert(text.to_owned(), index);
        Ok(index)
    }

    /// Add an integer constant.
    pub fn integer(&mut self, value: i32) -> Result<u16, BuildError> {
        self.push_constant(Constant::Integer(value))
    }

    /// Add a float constant.
    pub fn float(&mut self, value: f32) -> Result<u16, BuildError> {
        self.push_constant(Constant::Float(value))
    }

    /// Add a string literal.
    pub fn string(&mut self, text: &str) -> Result<u16, BuildError> {
        let utf8_index = self.utf8(text)?;
        self.push_constant(Constant::String { utf8_index })
    }

    /// Add a class reference.
    pub fn class_ref(&mut self, class_index: u16) -> Result<u16, BuildError> {
        self.push_constant(Constant::ClassRef { class_index })
    }

    /// Add a field reference. Field references naming a class, in pool
    /// order, also declare that class's field layout.
    pub fn field_ref(&mut self, class_index: u16, name: &str) -> Result<u16, BuildError> {
        let name_index = self.utf8(name)?;
        self.push_constant(Constant::FieldRef {
            class_index,
            name_index,
        })
    }

    /// Add a method reference for `invokevirtual`.
    pub fn method_ref(&mut self, class_index: u16, name: &str) -> Result<u16, BuildError> {
        let name_index = self.utf8(name)?;
        self.push_constant(Constant::MethodRef {
            class_index,
            name_index,
        })
    }

    /// Declare a class. `method_count` is filled in by [`build`](Self::build).
    pub fn class(
        &mut self,
        name: &str,
        super_class: Option<u16>,
        field_count: u16,
        flags: u16,
    ) -> Result<u16, BuildError> {
        let index = u16::try_from(self.classes.len())
            .ok()
            .filter(|&index| index != NO_SUPER_CLASS)
            .ok_or(BuildError::TableFull("class"))?;
        let name_index = self.utf8(name)?;
        self.classes.push(ClassDescriptor {
            name_index,
            super_class_index: super_class.unwrap_or(NO_SUPER_CLASS),
            field_count,
            method_count: 0,
            flags,
        });
        Ok(index)
    }

    /// Index the next [`method`](Self::method) call will return.
    pub fn next_method_index(&self) -> u16 {
        self.methods.len() as u16
    }

    /// Append a method body. Name it `Class.method` to place it in that
    /// class's vtable.
    pub fn method(
        &mut self,
        name: &str,
        param_count: u8,
        max_locals: u8,
        max_stack: u8,
        code: Vec<u8>,
    ) -> Result<u16, BuildError> {
        let index = u16::try_from(self.methods.len()).map_err(|_| BuildError::TableFull("method"))?;
        let end = self.code.len() + code.len();
        let code_offset = u16::try_from(self.code.len()).map_err(|_| BuildError::CodeTooLarge(end))?;
        let code_length = u16::try_from(code.len()).map_err(|_| BuildError::CodeTooLarge(end))?;
        let name_index = self.utf8(name)?;
        self.methods.push(MethodDescriptor {
            name_index,
            descriptor_index: name_index,
            code_offset,
            code_length,
            max_stack,
            max_locals,
            param_count,
            flags: 0,
        });
        self.code.extend_from_slice(&code);
        Ok(index)
    }

    /// Select the entry method.
    pub fn entry_point(&mut self, method_index: u16) -> &mut Self {
        self.entry_point = u32::from(method_index);
        self
    }

    /// Finish the image.
    pub fn build(mut self) -> ProgramImage {
        for class in &mut self.classes {
            let Some(class_name) = self.constants.utf8(class.name_index) else {
                continue;
            };
            let prefix = format!("{class_name}.");
            let bound = self
                .methods
                .iter()
                .filter_map(|method| self.constants.utf8(method.name_index))
                .filter(|name| name.starts_with(&prefix))
                .count();
            class.method_count = u16::try_from(bound).unwrap_or(u16::MAX);
        }

        ProgramImage {
            header: Header {
                entry_point: self.entry_point,
                ..Header::default()
            },
            constants: self.constants,
            methods: self.methods,
            classes: self.classes,
            code: self.code,
        }
    }
}
