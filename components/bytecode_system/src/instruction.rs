//! Instruction decoding and disassembly

use std::borrow::Cow;
use std::fmt;

use core_types::VmError;

use crate::constant::Constant;
use crate::opcode::{Opcode, OperandLayout};
use crate::program::ProgramImage;

/// Decoded inline operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    /// No operands
    None,
    /// Unsigned byte
    U8(u8),
    /// Signed byte
    I8(i8),
    /// Unsigned 16-bit index
    U16(u16),
    /// Signed 16-bit value
    I16(i16),
    /// Index and unsigned byte
    U16U8(u16, u8),
    /// Unsigned byte and signed byte
    U8I8(u8, i8),
}

impl Operands {
    /// First operand widened to `i32` (zero when absent).
    pub fn first(self) -> i32 {
        match self {
            Operands::None => 0,
            Operands::U8(v) | Operands::U8I8(v, _) => i32::from(v),
            Operands::I8(v) => i32::from(v),
            Operands::U16(v) | Operands::U16U8(v, _) => i32::from(v),
            Operands::I16(v) => i32::from(v),
        }
    }

    /// Second operand widened to `i32` (zero when absent).
    pub fn second(self) -> i32 {
        match self {
            Operands::U16U8(_, v) => i32::from(v),
            Operands::U8I8(_, v) => i32::from(v),
            _ => 0,
        }
    }

    /// First operand as an unsigned index.
    pub fn index(self) -> u16 {
        match self {
            Operands::U8(v) | Operands::U8I8(v, _) => u16::from(v),
            Operands::U16(v) | Operands::U16U8(v, _) => v,
            _ => 0,
        }
    }
}

/// One decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// Offset of the opcode byte within its method
    pub offset: usize,
    /// Opcode
    pub opcode: Opcode,
    /// Inline operands
    pub operands: Operands,
}

impl Instruction {
    /// Decode the instruction starting at `offset` in a method body.
    pub fn decode(code: &[u8], offset: usize) -> Result<Self, VmError> {
        let byte = *code.get(offset).ok_or(VmError::TruncatedInstruction(offset))?;
        let opcode = Opcode::from_byte(byte).ok_or(VmError::UnknownOpcode {
            opcode: byte,
            offset,
        })?;
        let layout = opcode.layout();
        let raw = code
            .get(offset + 1..offset + 1 + layout.width())
            .ok_or(VmError::TruncatedInstruction(offset))?;
        let operands = match layout {
            OperandLayout::None => Operands::None,
            OperandLayout::U8 => Operands::U8(raw[0]),
            OperandLayout::I8 => Operands::I8(raw[0] as i8),
            OperandLayout::U16 => Operands::U16(u16::from_le_bytes([raw[0], raw[1]])),
            OperandLayout::I16 => Operands::I16(i16::from_le_bytes([raw[0], raw[1]])),
            OperandLayout::U16U8 => Operands::U16U8(u16::from_le_bytes([raw[0], raw[1]]), raw[2]),
            OperandLayout::U8I8 => Operands::U8I8(raw[0], raw[1] as i8),
        };
        Ok(Self {
            offset,
            opcode,
            operands,
        })
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.opcode.encoded_len()
    }

    /// Always false: every instruction has an opcode byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Offset of the next instruction.
    pub fn next_offset(&self) -> usize {
        self.offset + self.len()
    }

    /// Absolute target of a branch instruction.
    pub fn branch_target(&self) -> Option<i64> {
        self.opcode
            .is_branch()
            .then(|| self.offset as i64 + i64::from(self.operands.first()))
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}: {}", self.offset, self.opcode.mnemonic())?;
        match (self.branch_target(), self.operands) {
            (Some(target), _) => write!(f, " {}", target),
            (None, Operands::None) => Ok(()),
            (None, Operands::U16U8(index, count)) => write!(f, " #{} {}", index, count),
            (None, Operands::U8I8(slot, delta)) => write!(f, " {} {}", slot, delta),
            (None, Operands::U16(index)) => write!(f, " #{}", index),
            (None, operands) => write!(f, " {}", operands.first()),
        }
    }
}

/// Render a listing of every method in the program.
pub fn disassemble(program: &ProgramImage) -> String {
    let mut out = String::new();

    for (index, method) in program.methods.iter().enumerate() {
        let name = program
            .constants
            .utf8(method.name_index)
            .unwrap_or(Cow::Borrowed("<unnamed>"));
        let marker = if index as u32 == program.header.entry_point {
            " (entry)"
        } else {
            ""
        };
        out.push_str(&format!(
            "method {} {}{}: params={} locals={} stack={}\n",
            index, name, marker, method.param_count, method.max_locals, method.max_stack
        ));

        let Some(code) = program.method_code(method) else {
            out.push_str("  <body outside bytecode buffer>\n");
            continue;
        };
        let mut offset = 0;
        while offset < code.len() {
            match Instruction::decode(code, offset) {
                Ok(insn) => {
                    out.push_str("  ");
                    out.push_str(&insn.to_string());
                    if let Some(comment) = operand_comment(program, &insn) {
                        out.push_str("  ; ");
                        out.push_str(&comment);
                    }
                    out.push('\n');
                    offset = insn.next_offset();
                }
                Err(err) => {
                    out.push_str(&format!("  {:04}: <{}>\n", offset, err));
                    break;
                }
            }
        }
    }

    out
}

fn operand_comment(program: &ProgramImage, insn: &Instruction) -> Option<String> {
    let pool = &program.constants;
    match insn.opcode {
        Opcode::Ldc | Opcode::LdcW | Opcode::Getfield | Opcode::Putfield | Opcode::InvokeVirtual
        | Opcode::New | Opcode::Instanceof | Opcode::Implements => {
            let index = insn.operands.index();
            Some(match pool.get(index)? {
                Constant::Integer(v) => v.to_string(),
                Constant::Float(v) => format!("{:.6}", v),
                Constant::String { .. } => format!("{:?}", pool.string(index)?),
                Constant::Utf8(raw) => format!("{:?}", String::from_utf8_lossy(raw)),
                Constant::ClassRef { class_index } => program.class_name(*class_index)?.into_owned(),
                Constant::FieldRef { name_index, .. } | Constant::MethodRef { name_index, .. } => {
                    pool.utf8(*name_index)?.into_owned()
                }
            })
        }
        Opcode::InvokeStatic => program.method_name(insn.operands.index()).map(Cow::into_owned),
        _ => None,
    }
}
