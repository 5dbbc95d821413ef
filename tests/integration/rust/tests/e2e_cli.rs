//! End-to-End CLI Integration Tests
//!
//! Tests the complete virtual machine through the kira_cli Runtime API.
//! This is the highest level integration test - program file to exit code.

use std::fs;

use bytecode_system::{CodeBuilder, Opcode, ProgramBuilder};
use core_types::VmError;
use integration_tests::fib_program;
use interpreter::VmConfig;
use kira_cli::{Cli, CliError, Runtime};
use tempfile::TempDir;

/// Test: a recursive program file runs to its exit code
#[test]
fn test_e2e_fib() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fib.kira");
    fib_program(10).save(&path).unwrap();

    let mut runtime = Runtime::new(VmConfig::default());
    assert_eq!(runtime.execute_file(&path).unwrap(), 55);
}

/// Test: the frame limit from the arguments bounds recursion depth
#[test]
fn test_e2e_max_frames() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fib.kira");
    fib_program(10).save(&path).unwrap();

    let mut cli = Cli::with_file(&path);
    cli.max_frames = Some(5);
    let mut runtime = Runtime::new(cli.vm_config().unwrap());
    match runtime.execute_file(&cli.file) {
        Err(CliError::Runtime(VmError::CallStackOverflow { limit })) => assert_eq!(limit, 5),
        other => panic!("expected call stack overflow, got {:?}", other),
    }

    cli.max_frames = Some(11);
    let mut runtime = Runtime::new(cli.vm_config().unwrap());
    assert_eq!(runtime.execute_file(&cli.file).unwrap(), 55);
}

/// Test: negative exit codes pass through unchanged
#[test]
fn test_e2e_negative_exit_code() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("neg.kira");
    let mut code = CodeBuilder::new();
    code.op_i16(Opcode::Sipush, -300).op(Opcode::Ireturn);
    let mut program = ProgramBuilder::new();
    program.method("main", 0, 0, 1, code.finish().unwrap()).unwrap();
    program.build().save(&path).unwrap();

    let mut runtime = Runtime::new(VmConfig::default()).with_print_bytecode(true);
    assert_eq!(runtime.execute_file(&path).unwrap(), -300);
}

/// Test: a corrupted file is reported as a load error
#[test]
fn test_e2e_corrupted_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fib.kira");
    let mut bytes = fib_program(3).to_bytes();
    bytes.truncate(bytes.len() - 3);
    fs::write(&path, bytes).unwrap();

    let mut runtime = Runtime::new(VmConfig::default());
    let err = runtime.execute_file(&path).unwrap_err();
    assert!(matches!(err, CliError::Load(_)));
    assert!(err.to_string().contains("truncated bytecode"));
}
