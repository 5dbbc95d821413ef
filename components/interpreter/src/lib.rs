//! Bytecode interpreter for Kira programs
//!
//! This crate provides a stack-based virtual machine with:
//! - One frame per method invocation, bounded by [`VmConfig::max_frames`]
//! - Reference-counted operands backed by `memory_manager`
//! - Virtual dispatch through per-call-site inline caches
//! - Instance fields resolved by name hash on the receiver's type
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use bytecode_system::{CodeBuilder, Opcode, ProgramBuilder};
//! use interpreter::{execute_program, VmConfig};
//!
//! let mut code = CodeBuilder::new();
//! code.op(Opcode::Iconst2).op(Opcode::Iconst3).op(Opcode::Imul).op(Opcode::Ireturn);
//!
//! let mut program = ProgramBuilder::new();
//! program.method("main", 0, 0, 2, code.finish().unwrap()).unwrap();
//!
//! let exit_code = execute_program(Arc::new(program.build()), VmConfig::default()).unwrap();
//! assert_eq!(exit_code, 6);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::Arc;

use bytecode_system::ProgramImage;
use core_types::VmError;

mod binary;
pub mod call_frame;
pub mod config;
mod dispatch;
pub mod format;
pub mod linker;
pub mod vm;

// Re-export main types at crate root
pub use call_frame::CallFrame;
pub use config::{VmConfig, DEFAULT_MAX_FRAMES};
pub use format::format_value;
pub use linker::{link, Linkage};
pub use vm::{Vm, VmState, TRACE_TARGET};

/// Run a program to completion with output on stdout.
///
/// The VM is torn down afterwards: every frame is unwound and every object
/// still live is released.
///
/// # Returns
///
/// * `Ok(code)` - the outermost method's integer return value, or 0
/// * `Err(VmError)` - the error that halted execution
pub fn execute_program(program: Arc<ProgramImage>, config: VmConfig) -> Result<i32, VmError> {
    let mut vm = Vm::new(program, config)?;
    let result = vm.run();
    vm.teardown();
    result
}
