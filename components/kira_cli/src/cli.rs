//! Command-line arguments

use std::fs;
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use interpreter::{VmConfig, TRACE_TARGET};
use log::LevelFilter;

use crate::error::CliResult;

/// Arguments accepted by `kira`
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "kira", version, about = "Run a compiled Kira program image")]
pub struct Cli {
    /// Program image to execute
    pub file: PathBuf,

    /// Print a disassembly of every method before running
    #[arg(long)]
    pub print_bytecode: bool,

    /// Log each executed instruction
    #[arg(long)]
    pub trace: bool,

    /// Maximum call depth
    #[arg(long, value_name = "N")]
    pub max_frames: Option<usize>,

    /// JSON file with VM settings; flags given on the command line win
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Raise the log level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Arguments for running `file` with every option at its default
    pub fn with_file(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            print_bytecode: false,
            trace: false,
            max_frames: None,
            config: None,
            verbose: 0,
        }
    }

    /// Build the VM configuration: the `--config` file first, then flag overrides.
    pub fn vm_config(&self) -> CliResult<VmConfig> {
        let mut config = match &self.config {
            Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
            None => VmConfig::default(),
        };
        if let Some(max_frames) = self.max_frames {
            config.max_frames = max_frames;
        }
        if self.trace {
            config.trace = true;
        }
        Ok(config)
    }

    /// Logger for a resolved configuration. `-v` sets the base level,
    /// `RUST_LOG` refines it and the instruction trace target opens
    /// whenever the configuration traces.
    pub fn logger(&self, config: &VmConfig) -> env_logger::Builder {
        let mut logger = env_logger::Builder::new();
        logger.filter_level(self.log_level()).parse_default_env();
        if let Some(level) = trace_level(config) {
            logger.filter_module(TRACE_TARGET, level);
        }
        logger
    }

    /// Log level selected by the `-v` count
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Level the trace target needs for `config` to be visible, if it traces.
pub fn trace_level(config: &VmConfig) -> Option<LevelFilter> {
    config.trace.then_some(LevelFilter::Info)
}
