//! Constant pool
//!
//! Append-only table of literals and symbolic references. Bytecode refers to
//! entries by index; the on-disk tag values match the JVM class-file tags.

use std::borrow::Cow;

/// On-disk constant tags.
pub mod tag {
    /// Name or string bytes
    pub const UTF8: u32 = 1;
    /// 32-bit integer
    pub const INTEGER: u32 = 3;
    /// 32-bit float
    pub const FLOAT: u32 = 4;
    /// Class reference
    pub const CLASS: u32 = 7;
    /// String literal (points at a UTF-8 entry)
    pub const STRING: u32 = 8;
    /// Field reference
    pub const FIELDREF: u32 = 9;
    /// Method reference
    pub const METHODREF: u32 = 10;
}

/// A single constant pool entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Raw bytes, used for names and string literals. Usually UTF-8 but
    /// never required to be.
    Utf8(Vec<u8>),
    /// Integer literal
    Integer(i32),
    /// Float literal
    Float(f32),
    /// String literal
    String {
        /// Index of the backing `Utf8` entry
        utf8_index: u16,
    },
    /// Reference to a class table entry
    ClassRef {
        /// Class table index
        class_index: u16,
    },
    /// Reference to a field of a class
    FieldRef {
        /// Owning class table index
        class_index: u16,
        /// Index of the `Utf8` field name
        name_index: u16,
    },
    /// Reference to a method by name
    MethodRef {
        /// Class table index of the static receiver type
        class_index: u16,
        /// Index of the `Utf8` method name
        name_index: u16,
    },
}

impl Constant {
    /// On-disk tag for this entry.
    pub fn tag(&self) -> u32 {
        match self {
            Constant::Utf8(_) => tag::UTF8,
            Constant::Integer(_) => tag::INTEGER,
            Constant::Float(_) => tag::FLOAT,
            Constant::String { .. } => tag::STRING,
            Constant::ClassRef { .. } => tag::CLASS,
            Constant::FieldRef { .. } => tag::FIELDREF,
            Constant::MethodRef { .. } => tag::METHODREF,
        }
    }

    /// Short kind name for listings and diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Constant::Utf8(_) => "utf8",
            Constant::Integer(_) => "integer",
            Constant::Float(_) => "float",
            Constant::String { .. } => "string",
            Constant::ClassRef { .. } => "class",
            Constant::FieldRef { .. } => "fieldref",
            Constant::MethodRef { .. } => "methodref",
        }
    }
}

/// Append-only constant table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return its index.
    pub fn add(&mut self, constant: Constant) -> usize {
        self.entries.push(constant);
        self.entries.len() - 1
    }

    /// Entry at `index`.
    pub fn get(&self, index: u16) -> Option<&Constant> {
        self.entries.get(usize::from(index))
    }

    /// Bytes of the `Utf8` entry at `index`.
    pub fn utf8_bytes(&self, index: u16) -> Option<&[u8]> {
        match self.get(index)? {
            Constant::Utf8(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Text of the `Utf8` entry at `index`, with invalid sequences replaced.
    pub fn utf8(&self, index: u16) -> Option<Cow<'_, str>> {
        self.utf8_bytes(index).map(String::from_utf8_lossy)
    }

    /// Bytes of a `String` constant, resolved through its `Utf8` entry.
    pub fn string_bytes(&self, index: u16) -> Option<&[u8]> {
        match self.get(index)? {
            Constant::String { utf8_index } => self.utf8_bytes(*utf8_index),
            _ => None,
        }
    }

    /// Text of a `String` constant.
    pub fn string(&self, index: u16) -> Option<Cow<'_, str>> {
        self.string_bytes(index).map(String::from_utf8_lossy)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in index order
    pub fn iter(&self) -> std::slice::Iter<'_, Constant> {
        self.entries.iter()
    }
}
