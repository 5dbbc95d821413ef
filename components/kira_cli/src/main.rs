//! Kira CLI
//!
//! Entry point for the virtual machine. Parses CLI arguments, sets up
//! logging and delegates to the Runtime for execution.

use clap::Parser as ClapParser;
use kira_cli::{Cli, CliError, Runtime};

fn main() {
    let cli = Cli::parse();

    let config = match cli.vm_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    cli.logger(&config).init();

    let mut runtime = Runtime::new(config).with_print_bytecode(cli.print_bytecode);

    match runtime.execute_file(&cli.file) {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(CliError::Load(e)) => {
            eprintln!("Error: could not load '{}': {}", cli.file.display(), e);
            std::process::exit(1);
        }
        Err(CliError::Runtime(e)) => {
            eprintln!("Runtime Error: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
