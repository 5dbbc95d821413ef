//! Opcode dispatch
//!
//! One arm per opcode. Every arm leaves reference counts balanced on both
//! paths: popped operands are released (or moved into the heap) before an
//! error is returned, and nothing is pushed when an instruction fails.

use std::borrow::Cow;
use std::io::Write;

use bytecode_system::{Constant, Instruction, Opcode, Operands};
use core_types::{Value, VmError};
use memory_manager::HeapObject;

use crate::binary::{condition, divide, float_compare, remainder};
use crate::format::format_value;
use crate::vm::{Vm, VmState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Member {
    Field,
    Method,
}

impl<W: Write> Vm<W> {
    /// Execute one decoded instruction of the current frame.
    pub(crate) fn dispatch(&mut self, insn: Instruction) -> Result<(), VmError> {
        match insn.opcode {
            // ===== Constants =====
            Opcode::Nop => Ok(()),
            Opcode::AconstNull => self.push(Value::null()),
            Opcode::IconstM1 => self.push_boxed(-1i32),
            Opcode::Iconst0 => self.push_boxed(0i32),
            Opcode::Iconst1 => self.push_boxed(1i32),
            Opcode::Iconst2 => self.push_boxed(2i32),
            Opcode::Iconst3 => self.push_boxed(3i32),
            Opcode::Iconst4 => self.push_boxed(4i32),
            Opcode::Iconst5 => self.push_boxed(5i32),
            Opcode::Fconst0 => self.push_boxed(0.0f32),
            Opcode::Fconst1 => self.push_boxed(1.0f32),
            Opcode::Fconst2 => self.push_boxed(2.0f32),
            Opcode::BconstTrue => self.push_boxed(true),
            Opcode::BconstFalse => self.push_boxed(false),
            Opcode::Bipush | Opcode::Sipush => self.push_boxed(insn.operands.first()),
            Opcode::Ldc | Opcode::LdcW => self.load_constant(insn.operands.index()),

            // ===== Locals =====
            Opcode::Load => self.load_local(usize::from(insn.operands.index())),
            Opcode::Load0 => self.load_local(0),
            Opcode::Load1 => self.load_local(1),
            Opcode::Load2 => self.load_local(2),
            Opcode::Load3 => self.load_local(3),
            Opcode::Store => self.store_local(usize::from(insn.operands.index())),
            Opcode::Store0 => self.store_local(0),
            Opcode::Store1 => self.store_local(1),
            Opcode::Store2 => self.store_local(2),
            Opcode::Store3 => self.store_local(3),
            Opcode::Iinc => self.increment_local(
                usize::from(insn.operands.index()),
                insn.operands.second(),
            ),

            // ===== Arrays =====
            Opcode::NewArray => self.new_array(),
            Opcode::ArrayLoad => self.array_load(),
            Opcode::ArrayStore => self.array_store(),
            Opcode::ArrayLength => {
                let array = self.pop()?;
                let length = self.heap.array_length(&array);
                self.heap.release_value(array);
                self.push_boxed(i32::try_from(length?).unwrap_or(i32::MAX))
            }

            // ===== Stack =====
            Opcode::Pop => {
                let value = self.pop()?;
                self.heap.release_value(value);
                Ok(())
            }
            Opcode::Pop2 => {
                let values = self.pop_n::<2>()?;
                self.discard(values);
                Ok(())
            }
            Opcode::Dup => {
                let frame = self.frames.last().ok_or(VmError::OperandStackUnderflow)?;
                let copy = self.heap.retain_value(frame.peek(0)?);
                self.push(copy)
            }
            Opcode::Swap => self.current_frame_mut()?.swap(),

            // ===== Arithmetic =====
            Opcode::Iadd => self.binary_op(|a: i32, b: i32| Ok(a.wrapping_add(b))),
            Opcode::Isub => self.binary_op(|a: i32, b: i32| Ok(a.wrapping_sub(b))),
            Opcode::Imul => self.binary_op(|a: i32, b: i32| Ok(a.wrapping_mul(b))),
            Opcode::Idiv => self.binary_op(divide),
            Opcode::Irem => self.binary_op(remainder),
            Opcode::Ineg => self.unary_op(|a: i32| a.wrapping_neg()),
            Opcode::Fadd => self.binary_op(|a: f32, b: f32| Ok(a + b)),
            Opcode::Fsub => self.binary_op(|a: f32, b: f32| Ok(a - b)),
            Opcode::Fmul => self.binary_op(|a: f32, b: f32| Ok(a * b)),
            Opcode::Fdiv => self.binary_op(|a: f32, b: f32| Ok(a / b)),
            Opcode::Frem => self.binary_op(|a: f32, b: f32| Ok(a % b)),
            Opcode::Fneg => self.unary_op(|a: f32| -a),
            Opcode::Ishl => self.binary_op(|a: i32, b: i32| Ok(a.wrapping_shl(b as u32))),
            Opcode::Ishr => self.binary_op(|a: i32, b: i32| Ok(a.wrapping_shr(b as u32))),
            Opcode::Iushr => {
                self.binary_op(|a: i32, b: i32| Ok((a as u32).wrapping_shr(b as u32) as i32))
            }
            Opcode::Iand => self.binary_op(|a: i32, b: i32| Ok(a & b)),
            Opcode::Ior => self.binary_op(|a: i32, b: i32| Ok(a | b)),
            Opcode::Ixor => self.binary_op(|a: i32, b: i32| Ok(a ^ b)),
            Opcode::I2f => self.unary_op(|a: i32| a as f32),
            Opcode::F2i => self.unary_op(|a: f32| a as i32),

            // ===== Compare and branch =====
            Opcode::Icmp => self.binary_op(|a: i32, b: i32| Ok(a.cmp(&b) as i32)),
            Opcode::Fcmp => self.binary_op(|a: f32, b: f32| Ok(float_compare(a, b))),
            Opcode::Ifeq
            | Opcode::Ifne
            | Opcode::Iflt
            | Opcode::Ifge
            | Opcode::Ifgt
            | Opcode::Ifle => {
                let value = self.pop_boxed::<i32>()?;
                self.branch_if(insn, condition(insn.opcode, value, 0))
            }
            Opcode::IfIcmpeq
            | Opcode::IfIcmpne
            | Opcode::IfIcmplt
            | Opcode::IfIcmpge
            | Opcode::IfIcmpgt
            | Opcode::IfIcmple => {
                let (a, b) = self.pop_int_pair()?;
                self.branch_if(insn, condition(insn.opcode, a, b))
            }
            Opcode::IfAcmpeq | Opcode::IfAcmpne => {
                let [lhs, rhs] = self.pop_n()?;
                let same = lhs == rhs;
                self.discard([lhs, rhs]);
                self.branch_if(insn, same == (insn.opcode == Opcode::IfAcmpeq))
            }
            Opcode::Ifnull | Opcode::Ifnonnull => {
                let value = self.pop()?;
                let is_null = value.is_null();
                self.heap.release_value(value);
                self.branch_if(insn, is_null == (insn.opcode == Opcode::Ifnull))
            }
            Opcode::Goto => self.jump(insn),
            Opcode::Jsr => {
                self.push(Value::ReturnAddress(insn.next_offset() as u32))?;
                self.jump(insn)
            }
            Opcode::Ret => {
                let frame = self.frames.last().ok_or(VmError::OperandStackUnderflow)?;
                let local = frame.local(usize::from(insn.operands.index()))?;
                let address = local
                    .as_return_address()
                    .ok_or_else(|| VmError::type_mismatch("return address", local.tag_name()))?;
                self.jump_to(insn.offset, i64::from(address))
            }

            // ===== Calls and returns =====
            Opcode::InvokeStatic => self.invoke(insn.operands.index()),
            Opcode::InvokeVirtual => self.invoke_virtual(insn),
            Opcode::Ireturn | Opcode::Freturn | Opcode::Areturn => {
                let result = self.pop()?;
                self.return_from_frame(Some(result))
            }
            Opcode::Return => self.return_from_frame(None),

            // ===== Objects and types =====
            Opcode::New => self.new_instance(insn.operands.index()),
            Opcode::Getfield => self.get_field(insn.operands.index()),
            Opcode::Putfield => self.put_field(insn.operands.index()),
            Opcode::Instanceof => self.type_test(insn.operands.index(), false),
            Opcode::Implements => self.type_test(insn.operands.index(), true),
            Opcode::NewTuple => {
                let count = usize::from(insn.operands.index());
                let elements = self.current_frame_mut()?.pop_many(count)?;
                let tuple = self.heap.alloc_tuple(elements);
                self.push(tuple)
            }
            Opcode::NewGeneric => self.new_generic(usize::from(insn.operands.index())),

            // ===== Misc =====
            Opcode::Print => {
                let value = self.pop()?;
                let text = format_value(&self.heap, &self.linkage.registry, &value);
                self.heap.release_value(value);
                writeln!(self.output, "{}", text)?;
                Ok(())
            }
            Opcode::Halt => {
                self.state = VmState::Halted;
                log::debug!("halt at offset {}", insn.offset);
                Ok(())
            }
        }
    }

    // ===== Control flow =====

    fn jump(&mut self, insn: Instruction) -> Result<(), VmError> {
        let target = insn.branch_target().unwrap_or(insn.offset as i64);
        self.jump_to(insn.offset, target)
    }

    fn jump_to(&mut self, offset: usize, target: i64) -> Result<(), VmError> {
        let frame = self.current_frame_mut()?;
        let ip = usize::try_from(target)
            .ok()
            .filter(|&ip| ip < frame.code_len())
            .ok_or(VmError::InvalidBranch { offset, target })?;
        frame.ip = ip;
        Ok(())
    }

    fn branch_if(&mut self, insn: Instruction, taken: bool) -> Result<(), VmError> {
        if taken {
            self.jump(insn)
        } else {
            Ok(())
        }
    }

    // ===== Constants and locals =====

    fn load_constant(&mut self, index: u16) -> Result<(), VmError> {
        let value = match self.program.constants.get(index) {
            Some(Constant::Integer(v)) => self.heap.box_int(*v),
            Some(Constant::Float(v)) => self.heap.box_float(*v),
            Some(Constant::String { utf8_index }) => {
                let text = self
                    .program
                    .constants
                    .utf8_bytes(*utf8_index)
                    .ok_or(VmError::InvalidConstant(*utf8_index))?;
                self.heap.alloc_string(text.to_vec())
            }
            Some(Constant::ClassRef { .. }) => {
                let type_id = self.class_operand(index)?;
                self.heap.alloc_type(type_id)
            }
            _ => return Err(VmError::InvalidConstant(index)),
        };
        self.push(value)
    }

    fn load_local(&mut self, index: usize) -> Result<(), VmError> {
        let frame = self.frames.last().ok_or(VmError::OperandStackUnderflow)?;
        let copy = self.heap.retain_value(frame.local(index)?);
        self.push(copy)
    }

    fn store_local(&mut self, index: usize) -> Result<(), VmError> {
        let value = self.pop()?;
        let slot = match self.frames.last_mut().map(|frame| frame.local_mut(index)) {
            Some(Ok(slot)) => slot,
            Some(Err(err)) => {
                self.heap.release_value(value);
                return Err(err);
            }
            None => {
                self.heap.release_value(value);
                return Err(VmError::OperandStackUnderflow);
            }
        };
        let previous = std::mem::replace(slot, value);
        self.heap.release_value(previous);
        Ok(())
    }

    fn increment_local(&mut self, index: usize, delta: i32) -> Result<(), VmError> {
        let frame = self
            .frames
            .last_mut()
            .ok_or(VmError::OperandStackUnderflow)?;
        let slot = frame.local_mut(index)?;
        let current = self.heap.unbox_int(slot)?;
        let updated = self.heap.box_int(current.wrapping_add(delta));
        let previous = std::mem::replace(slot, updated);
        self.heap.release_value(previous);
        Ok(())
    }

    // ===== Arrays =====

    fn new_array(&mut self) -> Result<(), VmError> {
        let length = self.pop_boxed::<i32>()?;
        let length = usize::try_from(length).map_err(|_| VmError::NegativeArrayLength(length))?;
        let array = self.heap.alloc_array(length);
        self.push(array)
    }

    fn array_load(&mut self) -> Result<(), VmError> {
        let [array, index] = self.pop_n()?;
        let element = self
            .heap
            .unbox_int(&index)
            .and_then(|i| self.heap.array_get(&array, i));
        self.discard([array, index]);
        self.push(element?)
    }

    fn array_store(&mut self) -> Result<(), VmError> {
        let [array, index, value] = self.pop_n()?;
        let stored = match self.heap.unbox_int(&index) {
            Ok(i) => self.heap.array_set(&array, i, value),
            Err(err) => {
                self.heap.release_value(value);
                Err(err)
            }
        };
        self.discard([array, index]);
        stored
    }

    // ===== Objects and types =====

    /// Type id named by a `ClassRef` constant.
    fn class_operand(&self, index: u16) -> Result<u32, VmError> {
        let Some(Constant::ClassRef { class_index }) = self.program.constants.get(index) else {
            return Err(VmError::InvalidConstant(index));
        };
        let type_id = u32::from(*class_index);
        match self.linkage.registry.get_type(type_id) {
            Some(_) => Ok(type_id),
            None => Err(VmError::UnknownType(type_id)),
        }
    }

    /// Name hash of a `FieldRef` or `MethodRef` constant.
    fn member_operand(&self, index: u16, member: Member) -> Result<u32, VmError> {
        let matches = match (member, self.program.constants.get(index)) {
            (Member::Field, Some(Constant::FieldRef { .. })) => true,
            (Member::Method, Some(Constant::MethodRef { .. })) => true,
            _ => false,
        };
        matches
            .then(|| self.linkage.member_hash(index))
            .flatten()
            .ok_or(VmError::InvalidConstant(index))
    }

    fn member_name(&self, index: u16) -> String {
        match self.program.constants.get(index) {
            Some(Constant::FieldRef { name_index, .. } | Constant::MethodRef { name_index, .. }) => {
                self.program
                    .constants
                    .utf8(*name_index)
                    .map_or_else(|| "?".to_owned(), Cow::into_owned)
            }
            _ => "?".to_owned(),
        }
    }

    fn type_name(&self, type_id: u32) -> String {
        self.linkage
            .registry
            .get_type(type_id)
            .map_or_else(|| format!("type#{type_id}"), |info| info.name.clone())
    }

    /// Type id of the instance `value` refers to.
    fn instance_type(&self, value: &Value) -> Result<u32, VmError> {
        match self.heap.object(value)? {
            HeapObject::Instance { type_id, .. } => Ok(*type_id),
            other => Err(VmError::type_mismatch("instance", other.kind().name())),
        }
    }

    /// Runtime type for `instanceof`/`implements`: instances report their
    /// class, generic instances their base type, everything else none.
    fn tested_type(&self, value: &Value) -> Result<Option<u32>, VmError> {
        if !matches!(value, Value::Reference(Some(_))) {
            return Ok(None);
        }
        Ok(match self.heap.object(value)? {
            HeapObject::Instance { type_id, .. } => Some(*type_id),
            HeapObject::GenericInstance { base_type, .. } => match self.heap.get(*base_type) {
                Some(HeapObject::Type(type_id)) => Some(*type_id),
                _ => None,
            },
            _ => None,
        })
    }

    fn new_instance(&mut self, index: u16) -> Result<(), VmError> {
        let type_id = self.class_operand(index)?;
        let info = self
            .linkage
            .registry
            .get_type(type_id)
            .ok_or(VmError::UnknownType(type_id))?;
        if info.is_abstract || info.is_trait {
            return Err(VmError::AbstractInstantiation(info.name.clone()));
        }
        let field_count = info.field_count();
        let instance = self.heap.alloc_instance(type_id as u16, type_id, field_count);
        self.push(instance)
    }

    fn resolve_field(&self, instance: &Value, index: u16, name_hash: u32) -> Result<u16, VmError> {
        let type_id = self.instance_type(instance)?;
        let registry = &self.linkage.registry;
        let info = registry
            .get_type(type_id)
            .ok_or(VmError::UnknownType(type_id))?;
        registry
            .lookup_field(info, name_hash)
            .ok_or_else(|| VmError::UnresolvedField {
                name: self.member_name(index),
                type_name: info.name.clone(),
            })
    }

    fn get_field(&mut self, index: u16) -> Result<(), VmError> {
        let name_hash = self.member_operand(index, Member::Field)?;
        let instance = self.pop()?;
        let value = self
            .resolve_field(&instance, index, name_hash)
            .and_then(|slot| self.heap.field_get(&instance, slot));
        self.heap.release_value(instance);
        self.push(value?)
    }

    fn put_field(&mut self, index: u16) -> Result<(), VmError> {
        let name_hash = self.member_operand(index, Member::Field)?;
        let [instance, value] = self.pop_n()?;
        let stored = match self.resolve_field(&instance, index, name_hash) {
            Ok(slot) => self.heap.field_set(&instance, slot, value),
            Err(err) => {
                self.heap.release_value(value);
                Err(err)
            }
        };
        self.heap.release_value(instance);
        stored
    }

    /// `invokevirtual`: resolve on the receiver's concrete type through the
    /// call site's inline cache, then call like `invokestatic`.
    fn invoke_virtual(&mut self, insn: Instruction) -> Result<(), VmError> {
        let Operands::U16U8(index, argc) = insn.operands else {
            return Err(VmError::TruncatedInstruction(insn.offset));
        };
        let name_hash = self.member_operand(index, Member::Method)?;
        if argc == 0 {
            return Err(VmError::type_mismatch("receiver", "no arguments"));
        }

        let frame = self.frames.last().ok_or(VmError::OperandStackUnderflow)?;
        let call_site = (frame.code_range().start + insn.offset) as u32;
        let type_id = self.instance_type(frame.peek(usize::from(argc) - 1)?)?;

        let method_index = self
            .linkage
            .registry
            .lookup_method_cached(type_id, name_hash, call_site)
            .ok_or_else(|| VmError::UnresolvedMethod {
                name: self.member_name(index),
                type_name: self.type_name(type_id),
            })?;
        let expected = self
            .program
            .method(method_index)
            .ok_or(VmError::MissingMethod(method_index))?
            .param_count;
        if expected != argc {
            return Err(VmError::ArityMismatch {
                method: method_index,
                expected,
                found: argc,
            });
        }
        self.invoke(method_index)
    }

    /// `instanceof` (subtype) or `implements` (declared trait); pushes 1 or 0.
    fn type_test(&mut self, index: u16, trait_test: bool) -> Result<(), VmError> {
        let target = self.class_operand(index)?;
        let value = self.pop()?;
        let tested = self.tested_type(&value).map(|type_id| {
            let registry = &self.linkage.registry;
            type_id
                .and_then(|type_id| registry.get_type(type_id))
                .is_some_and(|info| {
                    if trait_test {
                        registry.implements_trait(info, target)
                    } else {
                        registry.is_subtype(info, target)
                    }
                })
        });
        self.heap.release_value(value);
        self.push_boxed(i32::from(tested?))
    }

    /// `new_generic n`: `base, p1..pn -> Base<P1..Pn>`; every operand must
    /// be a type object.
    fn new_generic(&mut self, param_count: usize) -> Result<(), VmError> {
        let operands = self.current_frame_mut()?.pop_many(param_count + 1)?;
        let invalid = operands.iter().find_map(|value| match self.heap.object(value) {
            Ok(HeapObject::Type(_)) => None,
            Ok(other) => Some(VmError::type_mismatch("type", other.kind().name())),
            Err(err) => Some(err),
        });
        if let Some(err) = invalid {
            self.discard(operands);
            return Err(err);
        }

        let mut ids = operands.into_iter().filter_map(Value::into_object);
        let Some(base) = ids.next() else {
            return Err(VmError::OperandStackUnderflow);
        };
        let params = ids.collect();
        let generic = self.heap.alloc_generic(base, params);
        self.push(generic)
    }
}
