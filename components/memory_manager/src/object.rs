//! Heap object representation
//!
//! Payloads for every kind of object the interpreter can allocate. Objects
//! that hold references own one count per reference; [`HeapObject::release_into`]
//! hands those counts back to the heap when the object dies.

use core_types::{ObjectId, Value};

/// Object kinds, used for diagnostics and dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Boxed `i32`
    Integer,
    /// Boxed `f32`
    Float,
    /// One of the two boolean singletons
    Boolean,
    /// Byte string with cached hash
    String,
    /// Fixed-length array of values
    Array,
    /// Class instance
    Instance,
    /// Boxed type handle
    Type,
    /// Type applied to type parameters
    GenericInstance,
    /// Fixed-arity tuple
    Tuple,
}

impl ObjectKind {
    /// Lower-case kind name.
    pub fn name(self) -> &'static str {
        match self {
            ObjectKind::Integer => "integer",
            ObjectKind::Float => "float",
            ObjectKind::Boolean => "boolean",
            ObjectKind::String => "string",
            ObjectKind::Array => "array",
            ObjectKind::Instance => "instance",
            ObjectKind::Type => "type",
            ObjectKind::GenericInstance => "generic instance",
            ObjectKind::Tuple => "tuple",
        }
    }
}

/// Object payload stored in a heap slot.
#[derive(Debug, PartialEq)]
pub enum HeapObject {
    /// Boxed integer
    Integer(i32),
    /// Boxed float
    Float(f32),
    /// Boolean singleton
    Boolean(bool),
    /// Byte string
    String {
        /// Raw bytes
        bytes: Vec<u8>,
        /// Base-31 hash of `bytes`
        hash: u32,
    },
    /// Array elements; unset elements are `Value::Uninitialized`
    Array(Vec<Value>),
    /// Class instance
    Instance {
        /// Class table index
        class_index: u16,
        /// Registry type id; not a counted reference
        type_id: u32,
        /// Field slots in declaration order
        fields: Vec<Value>,
    },
    /// Handle to a registered type
    Type(u32),
    /// Generic type application
    GenericInstance {
        /// Counted reference to the base `Type` object
        base_type: ObjectId,
        /// Counted references to the parameter `Type` objects
        type_params: Vec<ObjectId>,
    },
    /// Tuple elements
    Tuple(Vec<Value>),
}

impl HeapObject {
    /// Kind of this payload
    pub fn kind(&self) -> ObjectKind {
        match self {
            HeapObject::Integer(_) => ObjectKind::Integer,
            HeapObject::Float(_) => ObjectKind::Float,
            HeapObject::Boolean(_) => ObjectKind::Boolean,
            HeapObject::String { .. } => ObjectKind::String,
            HeapObject::Array(_) => ObjectKind::Array,
            HeapObject::Instance { .. } => ObjectKind::Instance,
            HeapObject::Type(_) => ObjectKind::Type,
            HeapObject::GenericInstance { .. } => ObjectKind::GenericInstance,
            HeapObject::Tuple(_) => ObjectKind::Tuple,
        }
    }

    /// Consume the object, pushing every reference it owned onto `out`.
    pub fn release_into(self, out: &mut Vec<ObjectId>) {
        match self {
            HeapObject::Array(values)
            | HeapObject::Tuple(values)
            | HeapObject::Instance { fields: values, .. } => {
                out.extend(values.into_iter().filter_map(Value::into_object));
            }
            HeapObject::GenericInstance {
                base_type,
                type_params,
            } => {
                out.push(base_type);
                out.extend(type_params);
            }
            HeapObject::Integer(_)
            | HeapObject::Float(_)
            | HeapObject::Boolean(_)
            | HeapObject::String { .. }
            | HeapObject::Type(_) => {}
        }
    }
}
