//! Loaded program image
//!
//! The immutable result of loading a `KIRA` file: header metadata, constant
//! pool, method and class tables, and one shared bytecode buffer that every
//! method addresses by offset.

use std::borrow::Cow;

use crate::constant::ConstantPool;

/// File signature.
pub const MAGIC: [u8; 4] = *b"KIRA";
/// Format major version written by this crate.
pub const VERSION_MAJOR: u16 = 1;
/// Format minor version written by this crate.
pub const VERSION_MINOR: u16 = 0;
/// `super_class_index` value for a root class.
pub const NO_SUPER_CLASS: u16 = 0xFFFF;

/// Class flag bits.
pub mod class_flags {
    /// Cannot be instantiated
    pub const ABSTRACT: u16 = 0x1;
    /// Cannot be subclassed
    pub const FINAL: u16 = 0x2;
    /// Declares type parameters
    pub const GENERIC: u16 = 0x4;
    /// Trait declaration
    pub const TRAIT: u16 = 0x8;
}

/// Header metadata. Table sizes are not stored; they are recomputed from the
/// tables whenever the image is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Major format version
    pub major: u16,
    /// Minor format version
    pub minor: u16,
    /// Method table index of the entry method
    pub entry_point: u32,
    /// Reserved program flags
    pub flags: u32,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            major: VERSION_MAJOR,
            minor: VERSION_MINOR,
            entry_point: 0,
            flags: 0,
        }
    }
}

/// Method table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MethodDescriptor {
    /// `Utf8` name; `Owner.method` binds the method to a class vtable
    pub name_index: u16,
    /// `Utf8` signature descriptor
    pub descriptor_index: u16,
    /// Start of the body in the bytecode buffer
    pub code_offset: u16,
    /// Body length in bytes
    pub code_length: u16,
    /// Operand stack capacity
    pub max_stack: u8,
    /// Local slot count
    pub max_locals: u8,
    /// Number of arguments popped on entry (receiver included)
    pub param_count: u8,
    /// Reserved method flags
    pub flags: u8,
}

impl MethodDescriptor {
    /// Byte range of the body inside the bytecode buffer.
    pub fn code_range(&self) -> std::ops::Range<usize> {
        let start = usize::from(self.code_offset);
        start..start + usize::from(self.code_length)
    }

    /// Locals needed by a frame: never fewer than the parameters.
    pub fn frame_locals(&self) -> usize {
        usize::from(self.max_locals.max(self.param_count))
    }
}

/// Class table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassDescriptor {
    /// `Utf8` class name
    pub name_index: u16,
    /// Parent class index, or [`NO_SUPER_CLASS`]
    pub super_class_index: u16,
    /// Number of instance fields
    pub field_count: u16,
    /// Number of methods bound to the class
    pub method_count: u16,
    /// [`class_flags`] bits
    pub flags: u16,
}

impl ClassDescriptor {
    /// Parent class index, if any.
    pub fn super_class(&self) -> Option<u16> {
        (self.super_class_index != NO_SUPER_CLASS).then_some(self.super_class_index)
    }

    /// Whether a flag bit is set.
    pub fn has_flag(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }
}

/// An immutable, loaded compilation unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramImage {
    /// Header metadata
    pub header: Header,
    /// Constant pool
    pub constants: ConstantPool,
    /// Method table
    pub methods: Vec<MethodDescriptor>,
    /// Class table
    pub classes: Vec<ClassDescriptor>,
    /// Shared bytecode buffer
    pub code: Vec<u8>,
}

impl ProgramImage {
    /// Method descriptor at `index`.
    pub fn method(&self, index: u16) -> Option<&MethodDescriptor> {
        self.methods.get(usize::from(index))
    }

    /// Class descriptor at `index`.
    pub fn class(&self, index: u16) -> Option<&ClassDescriptor> {
        self.classes.get(usize::from(index))
    }

    /// Entry method, if the header names an existing one.
    pub fn entry_method(&self) -> Option<&MethodDescriptor> {
        usize::try_from(self.header.entry_point)
            .ok()
            .and_then(|index| self.methods.get(index))
    }

    /// Body bytes of a method; `None` when the range exceeds the buffer.
    pub fn method_code(&self, method: &MethodDescriptor) -> Option<&[u8]> {
        self.code.get(method.code_range())
    }

    /// Name of the method at `index`.
    pub fn method_name(&self, index: u16) -> Option<Cow<'_, str>> {
        self.method(index)
            .and_then(|method| self.constants.utf8(method.name_index))
    }

    /// Name of the class at `index`.
    pub fn class_name(&self, index: u16) -> Option<Cow<'_, str>> {
        self.class(index)
            .and_then(|class| self.constants.utf8(class.name_index))
    }
}
