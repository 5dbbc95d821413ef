//! Operand-stack value representation.
//!
//! Everything the interpreter moves around is a [`Value`]: either a nullable
//! reference into the object heap, an internal return address, or the
//! `Uninitialized` sentinel. Scalars never live in the tag itself; they are
//! boxed heap objects.

use std::fmt;

/// Generational handle to an object in the heap arena.
///
/// The index addresses an arena slot; the generation is bumped every time the
/// slot is reused, so a stale handle can never alias a newer object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl ObjectId {
    /// Create a handle from an arena index and generation.
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Arena slot index.
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Generation of the slot this handle was issued for.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// A value on the operand stack or in a local slot.
///
/// `Value` is intentionally not `Clone`. A non-null `Reference` owns one unit
/// of its object's reference count: duplicating it must go through
/// `Heap::retain_value` and discarding it through `Heap::release_value`.
/// Moving a `Value` moves the ownership with it.
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// let slot = Value::Uninitialized;
/// assert!(!slot.is_reference());
///
/// let ret = Value::ReturnAddress(12);
/// assert_eq!(ret.as_return_address(), Some(12));
/// ```
#[derive(Debug, PartialEq, Eq)]
pub enum Value {
    /// Nullable handle to a heap object
    Reference(Option<ObjectId>),
    /// Bytecode offset pushed by `jsr`, consumed by `ret`
    ReturnAddress(u32),
    /// Unset local, array element or field
    Uninitialized,
}

impl Value {
    /// The null reference.
    pub const fn null() -> Self {
        Value::Reference(None)
    }

    /// Wrap an object handle. The caller hands over one reference count.
    pub const fn object(id: ObjectId) -> Self {
        Value::Reference(Some(id))
    }

    /// Returns the referenced object, if any, without consuming the value.
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Reference(id) => *id,
            _ => None,
        }
    }

    /// Returns the return address carried by this value.
    pub fn as_return_address(&self) -> Option<u32> {
        match self {
            Value::ReturnAddress(address) => Some(*address),
            _ => None,
        }
    }

    /// Whether this is a `Reference` (null or not).
    pub fn is_reference(&self) -> bool {
        matches!(self, Value::Reference(_))
    }

    /// Whether this is the null reference.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Reference(None))
    }

    /// Short name of the variant, for diagnostics.
    pub fn tag_name(&self) -> &'static str {
        match self {
            Value::Reference(None) => "null",
            Value::Reference(Some(_)) => "reference",
            Value::ReturnAddress(_) => "return address",
            Value::Uninitialized => "uninitialized",
        }
    }

    /// Consume the value and hand its reference (if any) to the caller.
    ///
    /// This is the only way a `Reference` leaves a `Value` without being
    /// released; the heap uses it to take ownership back.
    pub fn into_object(self) -> Option<ObjectId> {
        let id = self.as_object();
        std::mem::forget(self);
        id
    }

    /// Move the value out, leaving `Uninitialized` behind.
    pub fn take(&mut self) -> Value {
        std::mem::replace(self, Value::Uninitialized)
    }
}

#[cfg(feature = "ref-count-check")]
impl Drop for Value {
    fn drop(&mut self) {
        if let Value::Reference(Some(id)) = self {
            if !std::thread::panicking() {
                panic!("Value::Reference({id:?}) dropped without release - reference count leak");
            }
        }
    }
}
