//! Integration test suite for the Kira virtual machine
//!
//! This crate provides integration tests that verify components work
//! together correctly across component boundaries.

use bytecode_system::{CodeBuilder, Opcode, ProgramBuilder, ProgramImage};

/// Re-export components for test convenience
pub mod components {
    pub use bytecode_system;
    pub use core_types;
    pub use interpreter;
    pub use kira_cli;
    pub use memory_manager;
    pub use type_registry;
}

/// A program whose entry method prints and returns `fib(n)`.
pub fn fib_program(n: i8) -> ProgramImage {
    let mut program = ProgramBuilder::new();
    let fib = program.next_method_index();

    let mut body = CodeBuilder::new();
    let recurse = body.label();
    body.op(Opcode::Load0)
        .op(Opcode::Iconst2)
        .branch(Opcode::IfIcmpge, recurse)
        .op(Opcode::Load0)
        .op(Opcode::Ireturn);
    body.bind(recurse)
        .op(Opcode::Load0)
        .op(Opcode::Iconst1)
        .op(Opcode::Isub)
        .op_u16(Opcode::InvokeStatic, fib)
        .op(Opcode::Load0)
        .op(Opcode::Iconst2)
        .op(Opcode::Isub)
        .op_u16(Opcode::InvokeStatic, fib)
        .op(Opcode::Iadd)
        .op(Opcode::Ireturn);
    program
        .method("fib", 1, 1, 3, body.finish().expect("fib assembles"))
        .expect("method table has room");

    let mut main = CodeBuilder::new();
    main.op_i8(Opcode::Bipush, n)
        .op_u16(Opcode::InvokeStatic, fib)
        .op(Opcode::Dup)
        .op(Opcode::Print)
        .op(Opcode::Ireturn);
    let entry = program
        .method("main", 0, 0, 2, main.finish().expect("main assembles"))
        .expect("method table has room");
    program.entry_point(entry);
    program.build()
}
