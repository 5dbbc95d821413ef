//! Scalar box/unbox pairs
//!
//! Lets arithmetic be written once over the payload type instead of once per
//! opcode.

use core_types::{Value, VmError};

use crate::heap::Heap;

/// A scalar that round-trips through a heap box.
pub trait Boxed: Copy {
    /// Kind name used in type-mismatch errors
    const KIND: &'static str;

    /// Allocate (or share) a box holding `self`.
    fn boxed(self, heap: &mut Heap) -> Value;

    /// Read the payload out of a boxed value.
    fn unboxed(heap: &Heap, value: &Value) -> Result<Self, VmError>;
}

impl Boxed for i32 {
    const KIND: &'static str = "integer";

    fn boxed(self, heap: &mut Heap) -> Value {
        heap.box_int(self)
    }

    fn unboxed(heap: &Heap, value: &Value) -> Result<Self, VmError> {
        heap.unbox_int(value)
    }
}

impl Boxed for f32 {
    const KIND: &'static str = "float";

    fn boxed(self, heap: &mut Heap) -> Value {
        heap.box_float(self)
    }

    fn unboxed(heap: &Heap, value: &Value) -> Result<Self, VmError> {
        heap.unbox_float(value)
    }
}

impl Boxed for bool {
    const KIND: &'static str = "boolean";

    fn boxed(self, heap: &mut Heap) -> Value {
        heap.box_bool(self)
    }

    fn unboxed(heap: &Heap, value: &Value) -> Result<Self, VmError> {
        heap.unbox_bool(value)
    }
}
