//! Tests for CodeBuilder and ProgramBuilder

use bytecode_system::{BuildError, CodeBuilder, Constant, Opcode, ProgramBuilder};

#[test]
fn test_forward_branch_patched() {
    let mut code = CodeBuilder::new();
    let skip = code.label();
    code.branch(Opcode::Goto, skip)
        .op(Opcode::Nop)
        .op(Opcode::Nop);
    code.bind(skip).op(Opcode::Return);
    let bytes = code.finish().unwrap();
    assert_eq!(&bytes[..3], &[0xa7, 5, 0]);
}

#[test]
fn test_branch_out_of_range() {
    let mut code = CodeBuilder::new();
    let far = code.label();
    code.branch(Opcode::Goto, far);
    for _ in 0..40_000 {
        code.op(Opcode::Nop);
    }
    code.bind(far);
    assert!(matches!(
        code.finish(),
        Err(BuildError::BranchOutOfRange { from: 0, .. })
    ));
}

#[test]
fn test_operand_encodings() {
    let mut code = CodeBuilder::new();
    code.op_u8_i8(Opcode::Iinc, 2, -1)
        .op_u16_u8(Opcode::InvokeVirtual, 0x0304, 2)
        .op_i16(Opcode::Sipush, -2);
    assert_eq!(
        code.finish().unwrap(),
        vec![0x84, 2, 0xff, 0xb6, 0x04, 0x03, 2, 0x11, 0xfe, 0xff]
    );
}

#[test]
fn test_methods_share_one_buffer() {
    let mut program = ProgramBuilder::new();
    let first = program.method("a", 0, 0, 0, vec![0x00, 0xb1]).unwrap();
    assert_eq!(program.next_method_index(), 1);
    let second = program.method("b", 0, 0, 0, vec![0xb1]).unwrap();
    let image = program.build();

    assert_eq!((first, second), (0, 1));
    assert_eq!(image.methods[1].code_offset, 2);
    assert_eq!(image.method_code(&image.methods[1]), Some(&[0xb1][..]));
}

#[test]
fn test_string_literal_references_utf8() {
    let mut program = ProgramBuilder::new();
    let literal = program.string("hi").unwrap();
    let image = program.build();
    assert!(matches!(
        image.constants.get(literal),
        Some(Constant::String { .. })
    ));
    assert_eq!(image.constants.string(literal).as_deref(), Some("hi"));
}

#[test]
fn test_code_too_large() {
    let mut program = ProgramBuilder::new();
    program.method("big", 0, 0, 0, vec![0; 65_535]).unwrap();
    program.method("next", 0, 0, 0, vec![0]).unwrap();
    let err = program.method("overflow", 0, 0, 0, vec![0]).unwrap_err();
    assert!(matches!(err, BuildError::CodeTooLarge(_)));
}
