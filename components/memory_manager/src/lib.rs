//! Memory Manager - reference-counted object heap
//!
//! This component provides:
//! - A generational arena of heap objects with explicit reference counts
//! - Bounded recycle pools for boxed integers and floats
//! - Per-heap boolean singletons and a small-integer cache
//! - Boxing helpers for every object kind the interpreter creates
//!
//! Reference cycles are never collected.

pub mod boxing;
pub mod heap;
pub mod object;

// Re-export main types
pub use boxing::Boxed;
pub use heap::{Heap, HeapConfig, HeapStats, SMALL_INT_MAX, SMALL_INT_MIN};
pub use object::{HeapObject, ObjectKind};
