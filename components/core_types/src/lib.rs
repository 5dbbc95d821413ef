//! Core value types and error handling for the Kira virtual machine.
//!
//! This crate provides the foundational types shared by every other
//! component: the tagged [`Value`] that lives on operand stacks and in local
//! slots, the generational [`ObjectId`] handle into the object heap, the
//! fatal [`VmError`] taxonomy and the 32-bit [`name_hash`] used for
//! equality-first member lookup.
//!
//! # Examples
//!
//! ```
//! use core_types::{name_hash, ObjectId, Value};
//!
//! let null = Value::null();
//! assert!(null.is_null());
//!
//! let reference = Value::object(ObjectId::new(3, 0));
//! assert_eq!(reference.as_object(), Some(ObjectId::new(3, 0)));
//! # let _ = reference.into_object();
//!
//! assert_eq!(name_hash(b"ab"), 97 * 31 + 98);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod hash;
mod value;

pub use error::VmError;
pub use hash::name_hash;
pub use value::{ObjectId, Value};
