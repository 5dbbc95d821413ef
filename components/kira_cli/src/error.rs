//! Error types for the CLI

use bytecode_system::LoadError;
use core_types::VmError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    /// The program file could not be read or decoded
    #[error("could not load program: {0}")]
    Load(#[from] LoadError),

    /// Execution halted with a fatal error
    #[error("runtime error: {0}")]
    Runtime(#[from] VmError),

    /// File I/O error outside program loading
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),

    /// The `--config` file is not a valid VM configuration
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
