//! Fatal runtime errors.
//!
//! Every condition listed here stops the virtual machine: the dispatch loop
//! marks the VM halted and records the error. Nothing is caught by program
//! code and nothing unwinds through bytecode frames.

use thiserror::Error;

/// A fatal condition raised while executing bytecode.
///
/// # Examples
///
/// ```
/// use core_types::VmError;
///
/// let err = VmError::ArrayIndexOutOfBounds { index: 5, length: 5 };
/// assert_eq!(err.to_string(), "array index 5 out of bounds for length 5");
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    /// The header's entry point names no method
    #[error("invalid entry point: method {0} does not exist")]
    InvalidEntryPoint(u32),

    /// Frame depth would exceed the configured limit
    #[error("call stack overflow: more than {limit} frames")]
    CallStackOverflow {
        /// Configured frame limit
        limit: usize,
    },

    /// `invokestatic` named a method index outside the method table
    #[error("method {0} does not exist")]
    MissingMethod(u16),

    /// Virtual dispatch found no method with the requested name
    #[error("type '{type_name}' has no method '{name}'")]
    UnresolvedMethod {
        /// Method name
        name: String,
        /// Receiver type name
        type_name: String,
    },

    /// Field access found no own field with the requested name
    #[error("type '{type_name}' has no field '{name}'")]
    UnresolvedField {
        /// Field name
        name: String,
        /// Instance type name
        type_name: String,
    },

    /// Virtual call arity does not match the resolved method
    #[error("method {method} expects {expected} arguments, call site passes {found}")]
    ArityMismatch {
        /// Resolved method index
        method: u16,
        /// Declared parameter count (receiver included)
        expected: u8,
        /// Arguments supplied by the call site (receiver included)
        found: u8,
    },

    /// Indexed array access outside `0..length`
    #[error("array index {index} out of bounds for length {length}")]
    ArrayIndexOutOfBounds {
        /// Requested index
        index: i32,
        /// Array length
        length: usize,
    },

    /// `newarray` with a negative length
    #[error("negative array length {0}")]
    NegativeArrayLength(i32),

    /// Integer division or remainder by zero
    #[error("integer division by zero")]
    DivisionByZero,

    /// Opcode byte with no instruction assigned
    #[error("unknown opcode 0x{opcode:02x} at offset {offset}")]
    UnknownOpcode {
        /// Offending byte
        opcode: u8,
        /// Bytecode offset
        offset: usize,
    },

    /// Inline operands run past the end of the method
    #[error("truncated instruction at offset {0}")]
    TruncatedInstruction(usize),

    /// Branch target outside the current method
    #[error("branch at offset {offset} targets {target}, outside the method")]
    InvalidBranch {
        /// Offset of the branch instruction
        offset: usize,
        /// Computed target
        target: i64,
    },

    /// Execution fell off the end of a method body
    #[error("execution ran past the end of method {method}")]
    CodeOverrun {
        /// Method index
        method: u16,
    },

    /// Push beyond the frame's declared `max_stack`
    #[error("operand stack overflow (capacity {capacity})")]
    OperandStackOverflow {
        /// Declared capacity
        capacity: usize,
    },

    /// Pop from an empty operand stack
    #[error("operand stack underflow")]
    OperandStackUnderflow,

    /// Local slot index beyond the frame's locals
    #[error("local slot {index} out of range ({count} locals)")]
    InvalidLocal {
        /// Requested slot
        index: usize,
        /// Number of slots in the frame
        count: usize,
    },

    /// Operand of the wrong kind
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Expected kind
        expected: &'static str,
        /// Kind actually found
        found: String,
    },

    /// Operation on a null reference
    #[error("null reference")]
    NullReference,

    /// Handle to an object that has already been reclaimed
    #[error("dangling reference {0}")]
    DanglingReference(String),

    /// Constant pool index out of range or of an unusable kind
    #[error("invalid constant pool entry {0}")]
    InvalidConstant(u16),

    /// Type id absent from the registry
    #[error("unknown type id {0}")]
    UnknownType(u32),

    /// `new` on an abstract class
    #[error("cannot instantiate abstract type '{0}'")]
    AbstractInstantiation(String),

    /// Writing `print` output failed
    #[error("failed to write program output: {0}")]
    Output(String),
}

impl VmError {
    /// Shorthand for a [`VmError::TypeMismatch`].
    pub fn type_mismatch(expected: &'static str, found: impl Into<String>) -> Self {
        VmError::TypeMismatch {
            expected,
            found: found.into(),
        }
    }
}

impl From<std::io::Error> for VmError {
    fn from(err: std::io::Error) -> Self {
        VmError::Output(err.to_string())
    }
}
