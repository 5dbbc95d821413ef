//! Program image for the Kira virtual machine
//!
//! This crate defines the instruction set and the immutable, loaded form of a
//! compiled unit: header, constant pool, method and class tables, and the
//! shared bytecode buffer.
//!
//! # Features
//!
//! - JVM-numbered, stack-based opcode set
//! - Binary `KIRA` loader and writer (bit-exact round trip)
//! - Label-resolving assembler for building programs in code
//! - Instruction decoder and disassembler
//!
//! # Example
//!
//! ```
//! use bytecode_system::{CodeBuilder, Opcode, ProgramBuilder, ProgramImage};
//!
//! let mut code = CodeBuilder::new();
//! code.op_i8(Opcode::Bipush, 42).op(Opcode::Ireturn);
//!
//! let mut program = ProgramBuilder::new();
//! let main = program.method("main", 0, 0, 1, code.finish().unwrap()).unwrap();
//! program.entry_point(main);
//! let image = program.build();
//!
//! let bytes = image.to_bytes();
//! let restored = ProgramImage::from_bytes(&bytes).unwrap();
//! assert_eq!(restored, image);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod codec;
pub mod constant;
pub mod instruction;
pub mod opcode;
pub mod program;

// Re-export main types at crate root
pub use builder::{BuildError, CodeBuilder, Label, ProgramBuilder};
pub use codec::LoadError;
pub use constant::{Constant, ConstantPool};
pub use instruction::{disassemble, Instruction, Operands};
pub use opcode::{Opcode, OperandLayout};
pub use program::{
    class_flags, ClassDescriptor, Header, MethodDescriptor, ProgramImage, MAGIC, NO_SUPER_CLASS,
};
