//! Integration tests for interpreter
//!
//! Whole programs assembled with the program builder and run on the VM,
//! checking output, exit codes, errors and heap balance together.

use std::sync::Arc;

use bytecode_system::{class_flags, CodeBuilder, Opcode, ProgramBuilder, ProgramImage};
use core_types::VmError;
use interpreter::{execute_program, Vm, VmConfig, VmState};
use type_registry::CacheState;

fn vm_for(program: ProgramImage) -> Vm<Vec<u8>> {
    Vm::with_output(Arc::new(program), VmConfig::default(), Vec::new()).unwrap()
}

fn printed(vm: &Vm<Vec<u8>>) -> String {
    String::from_utf8(vm.output().clone()).unwrap()
}

fn assert_balanced(vm: &Vm<Vec<u8>>) {
    assert_eq!(vm.heap().live_count(), vm.heap().permanent_count());
}

// ============================================================================
// Calls
// ============================================================================

/// fib(n) = n < 2 ? n : fib(n - 1) + fib(n - 2)
fn fib_program(n: i8) -> ProgramImage {
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
    program.method("fib", 1, 1, 3, body.finish().unwrap()).unwrap();

    let mut main = CodeBuilder::new();
    main.op_i8(Opcode::Bipush, n)
        .op_u16(Opcode::InvokeStatic, fib)
        .op(Opcode::Dup)
        .op(Opcode::Print)
        .op(Opcode::Ireturn);
    let entry = program.method("main", 0, 0, 2, main.finish().unwrap()).unwrap();
    program.entry_point(entry);
    program.build()
}

#[test]
fn test_recursive_fib() {
    let mut vm = vm_for(fib_program(10));
    assert_eq!(vm.run(), Ok(55));
    assert_eq!(vm.exit_code(), 55);
    assert_eq!(printed(&vm), "55\n");
    assert_balanced(&vm);
}

#[test]
fn test_fib_through_execute_program() {
    let exit_code = execute_program(Arc::new(fib_program(12)), VmConfig::default());
    assert_eq!(exit_code, Ok(144));
}

#[test]
fn test_unbounded_recursion_overflows() {
    let mut program = ProgramBuilder::new();
    let forever = program.next_method_index();
    let mut body = CodeBuilder::new();
    body.op_u16(Opcode::InvokeStatic, forever).op(Opcode::Return);
    program.method("forever", 0, 0, 0, body.finish().unwrap()).unwrap();

    let mut vm = vm_for(program.build());
    assert_eq!(vm.run(), Err(VmError::CallStackOverflow { limit: 64 }));
    assert_eq!(vm.state(), VmState::Halted);
    assert_balanced(&vm);
}

#[test]
fn test_frame_limit_is_configurable() {
    let mut program = ProgramBuilder::new();
    let forever = program.next_method_index();
    let mut body = CodeBuilder::new();
    body.op_u16(Opcode::InvokeStatic, forever).op(Opcode::Return);
    program.method("forever", 0, 0, 0, body.finish().unwrap()).unwrap();

    let config = VmConfig::default().with_max_frames(8);
    let mut vm = Vm::with_output(Arc::new(program.build()), config, Vec::new()).unwrap();
    while vm.step() == VmState::Running {}
    assert_eq!(vm.frame_depth(), 8);
    assert_eq!(vm.error(), Some(&VmError::CallStackOverflow { limit: 8 }));
}

#[test]
fn test_arguments_bind_in_order() {
    // sub(a, b) = a - b
    let mut program = ProgramBuilder::new();
    let mut body = CodeBuilder::new();
    body.op(Opcode::Load0)
        .op(Opcode::Load1)
        .op(Opcode::Isub)
        .op(Opcode::Ireturn);
    let sub = program.method("sub", 2, 2, 2, body.finish().unwrap()).unwrap();

    let mut main = CodeBuilder::new();
    main.op_i8(Opcode::Bipush, 10)
        .op_i8(Opcode::Bipush, 3)
        .op_u16(Opcode::InvokeStatic, sub)
        .op(Opcode::Ireturn);
    let entry = program.method("main", 0, 0, 2, main.finish().unwrap()).unwrap();
    program.entry_point(entry);

    assert_eq!(vm_for(program.build()).run(), Ok(7));
}

#[test]
fn test_missing_method() {
    let mut program = ProgramBuilder::new();
    let mut main = CodeBuilder::new();
    main.op_u16(Opcode::InvokeStatic, 40).op(Opcode::Return);
    program.method("main", 0, 0, 0, main.finish().unwrap()).unwrap();
    assert_eq!(vm_for(program.build()).run(), Err(VmError::MissingMethod(40)));
}

// ============================================================================
// Arrays
// ============================================================================

#[test]
fn test_array_bounds() {
    let mut code = CodeBuilder::new();
    let top = code.label();
    let done = code.label();
    code.op(Opcode::Iconst5)
        .op(Opcode::NewArray)
        .op(Opcode::Store0)
        .op(Opcode::Iconst0)
        .op(Opcode::Store1);
    // arr[i] = i for i in 0..5
    code.bind(top)
        .op(Opcode::Load1)
        .op(Opcode::Iconst5)
        .branch(Opcode::IfIcmpge, done)
        .op(Opcode::Load0)
        .op(Opcode::Load1)
        .op(Opcode::Load1)
        .op(Opcode::ArrayStore)
        .op_u8_i8(Opcode::Iinc, 1, 1)
        .branch(Opcode::Goto, top);
    code.bind(done)
        .op(Opcode::Load0)
        .op(Opcode::Iconst4)
        .op(Opcode::ArrayLoad)
        .op(Opcode::Print)
        .op(Opcode::Load0)
        .op(Opcode::ArrayLength)
        .op(Opcode::Print)
        .op(Opcode::Load0)
        .op(Opcode::Iconst5)
        .op(Opcode::ArrayLoad)
        .op(Opcode::Halt);

    let mut program = ProgramBuilder::new();
    program.method("main", 0, 2, 3, code.finish().unwrap()).unwrap();
    let mut vm = vm_for(program.build());

    while vm.step() == VmState::Running {}
    assert_eq!(
        vm.error(),
        Some(&VmError::ArrayIndexOutOfBounds { index: 5, length: 5 })
    );
    assert_eq!(vm.current_frame().unwrap().stack_depth(), 0);
    assert_eq!(printed(&vm), "4\n5\n");

    // unwinding releases the array held in local 0
    assert!(vm.run().is_err());
    assert_balanced(&vm);
}

#[test]
fn test_negative_array_length() {
    let mut code = CodeBuilder::new();
    code.op(Opcode::IconstM1).op(Opcode::NewArray).op(Opcode::Halt);
    let mut program = ProgramBuilder::new();
    program.method("main", 0, 0, 1, code.finish().unwrap()).unwrap();
    assert_eq!(
        vm_for(program.build()).run(),
        Err(VmError::NegativeArrayLength(-1))
    );
}

// ============================================================================
// Values and printing
// ============================================================================

#[test]
fn test_tuple_printing() {
    let mut program = ProgramBuilder::new();
    let half = program.float(2.5).unwrap();
    let mut code = CodeBuilder::new();
    code.op_i8(Opcode::Bipush, 42)
        .op_u8(Opcode::Ldc, half as u8)
        .op(Opcode::BconstTrue)
        .op_u8(Opcode::NewTuple, 3)
        .op(Opcode::Print)
        .op(Opcode::Return);
    program.method("main", 0, 0, 3, code.finish().unwrap()).unwrap();

    let mut vm = vm_for(program.build());
    assert_eq!(vm.run(), Ok(0));
    assert_eq!(printed(&vm), "(42, 2.500000, true)\n");
    assert_balanced(&vm);
}

#[test]
fn test_strings_and_null() {
    let mut program = ProgramBuilder::new();
    let greeting = program.string("hello, kira").unwrap();
    let mut code = CodeBuilder::new();
    code.op_u16(Opcode::LdcW, greeting)
        .op(Opcode::Print)
        .op(Opcode::AconstNull)
        .op(Opcode::Print)
        .op(Opcode::Halt);
    program.method("main", 0, 0, 1, code.finish().unwrap()).unwrap();

    let mut vm = vm_for(program.build());
    assert_eq!(vm.run(), Ok(0));
    assert_eq!(printed(&vm), "hello, kira\nnull\n");
    assert_balanced(&vm);
}

#[test]
fn test_float_arithmetic() {
    let mut code = CodeBuilder::new();
    // (2.0 + 1.0) / 2.0 -> 1.5, then f2i(1.5 * 2.0) = 3
    code.op(Opcode::Fconst2)
        .op(Opcode::Fconst1)
        .op(Opcode::Fadd)
        .op(Opcode::Fconst2)
        .op(Opcode::Fdiv)
        .op(Opcode::Dup)
        .op(Opcode::Print)
        .op(Opcode::Fconst2)
        .op(Opcode::Fmul)
        .op(Opcode::F2i)
        .op(Opcode::Ireturn);
    let mut program = ProgramBuilder::new();
    program.method("main", 0, 0, 2, code.finish().unwrap()).unwrap();

    let mut vm = vm_for(program.build());
    assert_eq!(vm.run(), Ok(3));
    assert_eq!(printed(&vm), "1.500000\n");
    assert_balanced(&vm);
}

#[test]
fn test_float_negation_remainder_and_conversion() {
    let mut code = CodeBuilder::new();
    code.op(Opcode::Iconst3)
        .op(Opcode::I2f)
        .op(Opcode::Fneg)
        .op(Opcode::Dup)
        .op(Opcode::Print)
        .op(Opcode::Fconst2)
        .op(Opcode::Frem)
        .op(Opcode::Print)
        .op(Opcode::Fconst2)
        .op(Opcode::Fconst1)
        .op(Opcode::Frem)
        .op(Opcode::Print)
        // 0.0 / 0.0 is NaN, which converts to 0
        .op(Opcode::Fconst0)
        .op(Opcode::Fconst0)
        .op(Opcode::Fdiv)
        .op(Opcode::F2i)
        .op(Opcode::Iconst1)
        .op(Opcode::Iadd)
        .op(Opcode::Ireturn);
    let mut program = ProgramBuilder::new();
    program.method("main", 0, 0, 2, code.finish().unwrap()).unwrap();

    let mut vm = vm_for(program.build());
    assert_eq!(vm.run(), Ok(1));
    assert_eq!(printed(&vm), "-3.000000\n-1.000000\n0.000000\n");
    assert_balanced(&vm);
}

#[test]
fn test_areturn_hands_reference_to_caller() {
    let mut program = ProgramBuilder::new();
    let text = program.string("made").unwrap();
    let mut make = CodeBuilder::new();
    make.op_u16(Opcode::LdcW, text).op(Opcode::Areturn);
    let make = program
        .method("make", 0, 0, 1, make.finish().unwrap())
        .unwrap();

    let mut main = CodeBuilder::new();
    main.op_u16(Opcode::InvokeStatic, make)
        .op(Opcode::Print)
        .op(Opcode::Iconst5)
        .op(Opcode::Areturn);
    let entry = program
        .method("main", 0, 0, 1, main.finish().unwrap())
        .unwrap();
    program.entry_point(entry);

    let mut vm = vm_for(program.build());
    assert_eq!(vm.run(), Ok(5));
    assert_eq!(printed(&vm), "made\n");
    assert_balanced(&vm);
}

#[test]
fn test_division_by_zero_halts() {
    let mut code = CodeBuilder::new();
    code.op(Opcode::Iconst1)
        .op(Opcode::Iconst0)
        .op(Opcode::Idiv)
        .op(Opcode::Print)
        .op(Opcode::Halt);
    let mut program = ProgramBuilder::new();
    program.method("main", 0, 0, 2, code.finish().unwrap()).unwrap();

    let mut vm = vm_for(program.build());
    assert_eq!(vm.run(), Err(VmError::DivisionByZero));
    assert_eq!(printed(&vm), "");
}

#[test]
fn test_subroutine_with_jsr_and_ret() {
    let mut code = CodeBuilder::new();
    let sub = code.label();
    code.branch(Opcode::Jsr, sub)
        .branch(Opcode::Jsr, sub)
        .op(Opcode::Load1)
        .op(Opcode::Ireturn);
    // local1 += 20, then return to the caller
    code.bind(sub)
        .op(Opcode::Store0)
        .op(Opcode::Load1)
        .op_i8(Opcode::Bipush, 20)
        .op(Opcode::Iadd)
        .op(Opcode::Store1)
        .op_u8(Opcode::Ret, 0);

    let mut program = ProgramBuilder::new();
    let mut main = CodeBuilder::new();
    main.op(Opcode::Iconst0).op(Opcode::Store1);
    let mut body = main.finish().unwrap();
    body.extend(code.finish().unwrap());
    program.method("main", 0, 2, 2, body).unwrap();

    let mut vm = vm_for(program.build());
    assert_eq!(vm.run(), Ok(40));
    assert_balanced(&vm);
}

// ============================================================================
// Classes, fields and dispatch
// ============================================================================

#[test]
fn test_fields_round_trip() {
    let mut program = ProgramBuilder::new();
    let point = program.class("Point", None, 2, 0).unwrap();
    let point_ref = program.class_ref(point).unwrap();
    let x = program.field_ref(point, "x").unwrap();
    let y = program.field_ref(point, "y").unwrap();

    let mut code = CodeBuilder::new();
    code.op_u16(Opcode::New, point_ref)
        .op(Opcode::Store0)
        .op(Opcode::Load0)
        .op_i8(Opcode::Bipush, 3)
        .op_u16(Opcode::Putfield, x)
        .op(Opcode::Load0)
        .op_i8(Opcode::Bipush, 4)
        .op_u16(Opcode::Putfield, y)
        .op(Opcode::Load0)
        .op(Opcode::Print)
        .op(Opcode::Load0)
        .op_u16(Opcode::Getfield, x)
        .op(Opcode::Load0)
        .op_u16(Opcode::Getfield, y)
        .op(Opcode::Imul)
        .op(Opcode::Ireturn);
    program.method("main", 0, 1, 2, code.finish().unwrap()).unwrap();

    let mut vm = vm_for(program.build());
    assert_eq!(vm.run(), Ok(12));
    assert_eq!(printed(&vm), "<Point>\n");
    assert_balanced(&vm);
}

#[test]
fn test_inherited_field_is_not_found() {
    let mut program = ProgramBuilder::new();
    let base = program.class("Base", None, 1, 0).unwrap();
    let derived = program.class("Derived", Some(base), 0, 0).unwrap();
    let derived_ref = program.class_ref(derived).unwrap();
    let id = program.field_ref(base, "id").unwrap();

    let mut code = CodeBuilder::new();
    code.op_u16(Opcode::New, derived_ref)
        .op_u16(Opcode::Getfield, id)
        .op(Opcode::Ireturn);
    program.method("main", 0, 0, 1, code.finish().unwrap()).unwrap();

    let mut vm = vm_for(program.build());
    assert_eq!(
        vm.run(),
        Err(VmError::UnresolvedField {
            name: "id".to_string(),
            type_name: "Derived".to_string(),
        })
    );
    assert_balanced(&vm);
}

#[test]
fn test_virtual_dispatch_and_caches() {
    let mut program = ProgramBuilder::new();
    let animal = program.class("Animal", None, 0, 0).unwrap();
    let dog = program.class("Dog", Some(animal), 0, 0).unwrap();
    let cat = program.class("Cat", Some(animal), 0, 0).unwrap();
    let dog_ref = program.class_ref(dog).unwrap();
    let cat_ref = program.class_ref(cat).unwrap();
    let speak = program.method_ref(animal, "speak").unwrap();

    let mut animal_speak = CodeBuilder::new();
    animal_speak.op(Opcode::Iconst1).op(Opcode::Ireturn);
    program
        .method("Animal.speak", 1, 1, 1, animal_speak.finish().unwrap())
        .unwrap();
    let mut dog_speak = CodeBuilder::new();
    dog_speak.op(Opcode::Iconst2).op(Opcode::Ireturn);
    program
        .method("Dog.speak", 1, 1, 1, dog_speak.finish().unwrap())
        .unwrap();

    let mut code = CodeBuilder::new();
    let top = code.label();
    let done = code.label();
    code.op_u16(Opcode::New, dog_ref)
        .op(Opcode::Store0)
        .op_u16(Opcode::New, cat_ref)
        .op(Opcode::Store1)
        .op(Opcode::Iconst0)
        .op(Opcode::Store2);
    code.bind(top)
        .op(Opcode::Load2)
        .op(Opcode::Iconst3)
        .branch(Opcode::IfIcmpge, done)
        .op(Opcode::Load0);
    let dog_site = code.offset();
    code.op_u16_u8(Opcode::InvokeVirtual, speak, 1)
        .op(Opcode::Print)
        .op(Opcode::Load1);
    let cat_site = code.offset();
    code.op_u16_u8(Opcode::InvokeVirtual, speak, 1)
        .op(Opcode::Print)
        .op_u8_i8(Opcode::Iinc, 2, 1)
        .branch(Opcode::Goto, top);
    code.bind(done).op(Opcode::Return);
    let main = program.method("main", 0, 3, 2, code.finish().unwrap()).unwrap();
    program.entry_point(main);
    let image = program.build();
    let base = u32::from(image.method(main).unwrap().code_offset);

    let mut vm = vm_for(image);
    assert_eq!(vm.run(), Ok(0));
    assert_eq!(printed(&vm), "2\n1\n2\n1\n2\n1\n");

    let registry = vm.registry();
    assert_eq!(registry.ancestor_walks(), 2);
    let dog_cache = registry.inline_cache(base + dog_site as u32).unwrap();
    assert_eq!(dog_cache.state(), CacheState::Monomorphic);
    assert_eq!(dog_cache.entries()[0].hit_count, 2);
    let cat_cache = registry.inline_cache(base + cat_site as u32).unwrap();
    assert_eq!(cat_cache.entries()[0].type_id, u32::from(cat));
    assert_balanced(&vm);
}

#[test]
fn test_megamorphic_site_still_resolves() {
    let mut program = ProgramBuilder::new();
    let root = program.class("Shape", None, 0, 0).unwrap();
    let mut refs = Vec::new();
    for (i, name) in ["A", "B", "C", "D", "E", "F"].iter().enumerate() {
        let class = program.class(name, Some(root), 0, 0).unwrap();
        refs.push(program.class_ref(class).unwrap());
        let mut body = CodeBuilder::new();
        body.op_i8(Opcode::Bipush, i as i8 + 10).op(Opcode::Ireturn);
        program
            .method(&format!("{name}.id"), 1, 1, 1, body.finish().unwrap())
            .unwrap();
    }
    let id = program.method_ref(root, "id").unwrap();

    // one shared helper call site sees all six receiver types
    let mut helper = CodeBuilder::new();
    helper
        .op(Opcode::Load0)
        .op_u16_u8(Opcode::InvokeVirtual, id, 1)
        .op(Opcode::Print)
        .op(Opcode::Return);
    let call = program
        .method("call", 1, 1, 1, helper.finish().unwrap())
        .unwrap();

    let mut code = CodeBuilder::new();
    for class_ref in &refs {
        code.op_u16(Opcode::New, *class_ref)
            .op_u16(Opcode::InvokeStatic, call);
    }
    code.op(Opcode::Return);
    let main = program.method("main", 0, 0, 1, code.finish().unwrap()).unwrap();
    program.entry_point(main);
    let image = program.build();
    let site = u32::from(image.method(call).unwrap().code_offset) + 1;

    let mut vm = vm_for(image);
    assert_eq!(vm.run(), Ok(0));
    assert_eq!(printed(&vm), "10\n11\n12\n13\n14\n15\n");
    let cache = vm.registry().inline_cache(site).unwrap();
    assert_eq!(cache.len(), 4);
    assert_eq!(cache.state(), CacheState::Polymorphic);
    assert_eq!(vm.registry().ancestor_walks(), 6);
}

#[test]
fn test_unresolved_virtual_method() {
    let mut program = ProgramBuilder::new();
    let thing = program.class("Thing", None, 0, 0).unwrap();
    let thing_ref = program.class_ref(thing).unwrap();
    let missing = program.method_ref(thing, "missing").unwrap();
    let mut code = CodeBuilder::new();
    code.op_u16(Opcode::New, thing_ref)
        .op_u16_u8(Opcode::InvokeVirtual, missing, 1)
        .op(Opcode::Return);
    program.method("main", 0, 0, 1, code.finish().unwrap()).unwrap();

    let mut vm = vm_for(program.build());
    assert_eq!(
        vm.run(),
        Err(VmError::UnresolvedMethod {
            name: "missing".to_string(),
            type_name: "Thing".to_string(),
        })
    );
    assert_balanced(&vm);
}

#[test]
fn test_abstract_class_cannot_be_instantiated() {
    let mut program = ProgramBuilder::new();
    let shape = program
        .class("Shape", None, 0, class_flags::ABSTRACT)
        .unwrap();
    let shape_ref = program.class_ref(shape).unwrap();
    let mut code = CodeBuilder::new();
    code.op_u16(Opcode::New, shape_ref).op(Opcode::Return);
    program.method("main", 0, 0, 1, code.finish().unwrap()).unwrap();

    assert_eq!(
        vm_for(program.build()).run(),
        Err(VmError::AbstractInstantiation("Shape".to_string()))
    );
}

#[test]
fn test_instanceof_and_implements() {
    let mut program = ProgramBuilder::new();
    let printable = program
        .class("Printable", None, 0, class_flags::TRAIT | class_flags::ABSTRACT)
        .unwrap();
    let doc = program.class("Doc", Some(printable), 0, 0).unwrap();
    let memo = program.class("Memo", Some(doc), 0, 0).unwrap();
    let printable_ref = program.class_ref(printable).unwrap();
    let doc_ref = program.class_ref(doc).unwrap();
    let memo_ref = program.class_ref(memo).unwrap();

    let mut code = CodeBuilder::new();
    code.op_u16(Opcode::New, memo_ref)
        .op(Opcode::Store0)
        // Memo instanceof Doc
        .op(Opcode::Load0)
        .op_u16(Opcode::Instanceof, doc_ref)
        .op(Opcode::Print)
        // Memo implements Printable: only Doc declares it
        .op(Opcode::Load0)
        .op_u16(Opcode::Implements, printable_ref)
        .op(Opcode::Print)
        // Doc implements Printable
        .op_u16(Opcode::New, doc_ref)
        .op_u16(Opcode::Implements, printable_ref)
        .op(Opcode::Print)
        // null instanceof Doc
        .op(Opcode::AconstNull)
        .op_u16(Opcode::Instanceof, doc_ref)
        .op(Opcode::Print)
        .op(Opcode::Return);
    program.method("main", 0, 1, 1, code.finish().unwrap()).unwrap();

    let mut vm = vm_for(program.build());
    assert_eq!(vm.run(), Ok(0));
    assert_eq!(printed(&vm), "1\n0\n1\n0\n");
    assert_balanced(&vm);
}

#[test]
fn test_generic_instance_printing() {
    let mut program = ProgramBuilder::new();
    let map = program
        .class("Map", None, 0, class_flags::GENERIC)
        .unwrap();
    let key = program.class("Key", None, 0, 0).unwrap();
    let value = program.class("Value", None, 0, 0).unwrap();
    let refs = [
        program.class_ref(map).unwrap(),
        program.class_ref(key).unwrap(),
        program.class_ref(value).unwrap(),
    ];

    let mut code = CodeBuilder::new();
    for class_ref in refs {
        code.op_u16(Opcode::LdcW, class_ref);
    }
    code.op_u8(Opcode::NewGeneric, 2)
        .op(Opcode::Dup)
        .op(Opcode::Print)
        .op_u16(Opcode::Instanceof, refs[0])
        .op(Opcode::Print)
        .op(Opcode::Return);
    program.method("main", 0, 0, 3, code.finish().unwrap()).unwrap();

    let mut vm = vm_for(program.build());
    assert_eq!(vm.run(), Ok(0));
    assert_eq!(printed(&vm), "Map<Key, Value>\n1\n");
    assert_balanced(&vm);
}

// ============================================================================
// Malformed code
// ============================================================================

#[test]
fn test_unknown_opcode_halts() {
    let mut program = ProgramBuilder::new();
    program.method("main", 0, 0, 1, vec![0x00, 0xee]).unwrap();
    let mut vm = vm_for(program.build());
    assert_eq!(
        vm.run(),
        Err(VmError::UnknownOpcode {
            opcode: 0xee,
            offset: 1,
        })
    );
}

#[test]
fn test_branch_outside_method() {
    let mut code = CodeBuilder::new();
    code.op_i16(Opcode::Goto, 100);
    let mut program = ProgramBuilder::new();
    program.method("main", 0, 0, 0, code.finish().unwrap()).unwrap();
    assert_eq!(
        vm_for(program.build()).run(),
        Err(VmError::InvalidBranch {
            offset: 0,
            target: 100,
        })
    );
}

#[test]
fn test_type_mismatch_releases_operands() {
    let mut program = ProgramBuilder::new();
    let text = program.string("not a number").unwrap();
    let mut code = CodeBuilder::new();
    code.op_u16(Opcode::LdcW, text)
        .op(Opcode::Iconst1)
        .op(Opcode::Iadd)
        .op(Opcode::Ireturn);
    program.method("main", 0, 0, 2, code.finish().unwrap()).unwrap();

    let mut vm = vm_for(program.build());
    assert!(matches!(
        vm.run(),
        Err(VmError::TypeMismatch {
            expected: "integer",
            ..
        })
    ));
    assert_balanced(&vm);
}
