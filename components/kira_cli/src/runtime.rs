//! Program loading and execution

use std::path::Path;
use std::sync::Arc;

use bytecode_system::{disassemble, ProgramImage};
use interpreter::{execute_program, VmConfig};
use log::{debug, info};

use crate::error::CliResult;

/// Loads program images and runs them with a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct Runtime {
    config: VmConfig,
    print_bytecode: bool,
}

impl Runtime {
    /// Create a runtime that executes with `config`
    pub fn new(config: VmConfig) -> Self {
        Self {
            config,
            print_bytecode: false,
        }
    }

    /// Print the disassembly of each loaded program before running it
    pub fn with_print_bytecode(mut self, enabled: bool) -> Self {
        self.print_bytecode = enabled;
        self
    }

    /// Check if bytecode printing is enabled
    pub fn is_print_bytecode_enabled(&self) -> bool {
        self.print_bytecode
    }

    /// Configuration every run uses
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Read and decode a program image
    pub fn load_file(&self, path: impl AsRef<Path>) -> CliResult<ProgramImage> {
        let path = path.as_ref();
        let program = ProgramImage::load(path)?;
        debug!(
            "loaded {}: {} constants, {} methods, {} classes, {} code bytes",
            path.display(),
            program.constants.len(),
            program.methods.len(),
            program.classes.len(),
            program.code.len()
        );
        Ok(program)
    }

    /// Load a program file and run it to completion.
    ///
    /// Returns the program's exit code.
    pub fn execute_file(&mut self, path: impl AsRef<Path>) -> CliResult<i32> {
        let program = self.load_file(path)?;
        if self.print_bytecode {
            print!("{}", disassemble(&program));
        }
        self.execute(Arc::new(program))
    }

    /// Run an already loaded program
    pub fn execute(&mut self, program: Arc<ProgramImage>) -> CliResult<i32> {
        let exit_code = execute_program(program, self.config.clone())?;
        info!("program exited with code {}", exit_code);
        Ok(exit_code)
    }
}
