//! Kira CLI Library
//!
//! Provides the Runtime struct and supporting modules for the `kira` binary.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod error;
pub mod runtime;

pub use cli::{trace_level, Cli};
pub use error::{CliError, CliResult};
pub use runtime::Runtime;
