//! Tests for the instruction decoder and listing

use bytecode_system::{disassemble, CodeBuilder, Instruction, Opcode, ProgramBuilder};

#[test]
fn test_listing_names_methods_and_constants() {
    let mut program = ProgramBuilder::new();
    let pi = program.float(3.25).unwrap();
    let mut code = CodeBuilder::new();
    code.op_u8(Opcode::Ldc, pi as u8).op(Opcode::Print).op(Opcode::Halt);
    let main = program.method("main", 0, 0, 1, code.finish().unwrap()).unwrap();
    program.entry_point(main);

    let listing = disassemble(&program.build());
    assert!(listing.contains("method 0 main (entry)"));
    assert!(listing.contains("0000: ldc 0  ; 3.250000"));
    assert!(listing.contains("0003: halt"));
}

#[test]
fn test_listing_stops_at_bad_opcode() {
    let mut program = ProgramBuilder::new();
    program.method("broken", 0, 0, 0, vec![0x00, 0xee, 0x00]).unwrap();
    let listing = disassemble(&program.build());
    assert!(listing.contains("0001: <unknown opcode 0xee at offset 1>"));
    assert!(!listing.contains("0002"));
}

#[test]
fn test_walk_instructions() {
    let mut code = CodeBuilder::new();
    code.op_i8(Opcode::Bipush, 3)
        .op_u8(Opcode::Store, 4)
        .op(Opcode::Return);
    let bytes = code.finish().unwrap();

    let mut offsets = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let insn = Instruction::decode(&bytes, offset).unwrap();
        offsets.push(insn.offset);
        offset = insn.next_offset();
    }
    assert_eq!(offsets, vec![0, 2, 4]);
}
