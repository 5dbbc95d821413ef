//! Type registry for the Kira virtual machine
//!
//! Maps numeric type ids to [`TypeInfo`] descriptors and answers the
//! questions the interpreter asks at run time:
//!
//! - virtual method resolution (nearest ancestor first), optionally through
//!   a 4-way per-call-site [`InlineCache`]
//! - own-field lookup for `getfield` / `putfield`
//! - subtype and trait membership tests
//!
//! Every member descriptor carries a 32-bit name hash and lookups compare
//! hashes only.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod inline_cache;
pub mod registry;
pub mod type_info;

pub use inline_cache::{CacheEntry, CacheState, CallSiteId, InlineCache, CACHE_WAYS};
pub use registry::{Ancestors, TypeRegistry};
pub use type_info::{FieldDescriptor, TypeInfo, VTable, VTableEntry, NO_PARENT};
