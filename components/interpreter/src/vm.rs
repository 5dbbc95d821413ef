//! Virtual machine state and the fetch/execute loop
//!
//! The VM exclusively owns the heap, the type registry with its inline
//! caches, and the frame stack. The program image is shared and never
//! mutated.

use std::io::{self, Stdout, Write};
use std::sync::Arc;

use bytecode_system::{Instruction, ProgramImage};
use core_types::{Value, VmError};
use memory_manager::{Boxed, Heap};
use type_registry::TypeRegistry;

use crate::call_frame::CallFrame;
use crate::config::VmConfig;
use crate::linker::{link, Linkage};

/// Log target carrying one record per executed instruction when tracing.
pub const TRACE_TARGET: &str = "kira::trace";

/// Execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    /// More instructions to execute
    Running,
    /// Stopped by `halt`, by the outermost return, or by an error
    Halted,
}

/// Virtual machine executing one program
///
/// Output written by `print` goes to `W` (stdout unless a writer is given
/// through [`Vm::with_output`]).
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use bytecode_system::{CodeBuilder, Opcode, ProgramBuilder};
/// use interpreter::{Vm, VmConfig};
///
/// let mut code = CodeBuilder::new();
/// code.op_i8(Opcode::Bipush, 7).op(Opcode::Print).op(Opcode::Halt);
/// let mut program = ProgramBuilder::new();
/// program.method("main", 0, 0, 1, code.finish().unwrap()).unwrap();
///
/// let mut vm = Vm::with_output(Arc::new(program.build()), VmConfig::default(), Vec::new()).unwrap();
/// assert_eq!(vm.run(), Ok(0));
/// assert_eq!(vm.output(), b"7\n");
/// ```
#[derive(Debug)]
pub struct Vm<W: Write = Stdout> {
    pub(crate) program: Arc<ProgramImage>,
    pub(crate) config: VmConfig,
    pub(crate) heap: Heap,
    pub(crate) linkage: Linkage,
    pub(crate) frames: Vec<CallFrame>,
    pub(crate) state: VmState,
    pub(crate) exit_code: i32,
    pub(crate) output: W,
    error: Option<VmError>,
    instructions: u64,
}

impl Vm<Stdout> {
    /// Create a VM that prints to stdout.
    pub fn new(program: Arc<ProgramImage>, config: VmConfig) -> Result<Self, VmError> {
        Self::with_output(program, config, io::stdout())
    }
}

impl<W: Write> Vm<W> {
    /// Create a VM positioned at the program's entry method.
    ///
    /// # Errors
    ///
    /// `InvalidEntryPoint` when the header names no existing method; the
    /// program never starts.
    pub fn with_output(
        program: Arc<ProgramImage>,
        config: VmConfig,
        output: W,
    ) -> Result<Self, VmError> {
        let entry_point = program.header.entry_point;
        let (entry, method) = u16::try_from(entry_point)
            .ok()
            .and_then(|index| program.method(index).map(|method| (index, *method)))
            .ok_or(VmError::InvalidEntryPoint(entry_point))?;

        let linkage = link(&program);
        let heap = Heap::new(config.heap.clone());
        let mut frames = Vec::with_capacity(config.max_frames.min(1024));
        frames.push(CallFrame::new(entry, &method, None));

        log::debug!(
            "vm started at method {} '{}' ({} types linked)",
            entry,
            program.method_name(entry).as_deref().unwrap_or("?"),
            linkage.registry.len()
        );

        Ok(Self {
            program,
            config,
            heap,
            linkage,
            frames,
            state: VmState::Running,
            exit_code: 0,
            output,
            error: None,
            instructions: 0,
        })
    }

    /// Execute one instruction. Errors halt the VM and are kept for
    /// [`error`](Self::error).
    pub fn step(&mut self) -> VmState {
        if self.state == VmState::Running {
            if let Err(err) = self.execute_next() {
                log::error!("vm halted: {}", err);
                self.error = Some(err);
                self.state = VmState::Halted;
            }
        }
        self.state
    }

    /// Run until halted, then unwind any remaining frames.
    ///
    /// Returns the exit code, or the error that stopped the program.
    pub fn run(&mut self) -> Result<i32, VmError> {
        while self.step() == VmState::Running {}
        self.unwind();
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(self.exit_code),
        }
    }

    /// Release every frame, then drop whatever objects are still live.
    ///
    /// Returns the number of non-permanent objects the heap still held.
    pub fn teardown(&mut self) -> usize {
        self.state = VmState::Halted;
        self.unwind();
        let leftover = self.heap.clear();
        if leftover > 0 {
            log::debug!("teardown reclaimed {} unreleased objects", leftover);
        }
        leftover
    }

    fn execute_next(&mut self) -> Result<(), VmError> {
        let Some(frame) = self.frames.last_mut() else {
            self.state = VmState::Halted;
            return Ok(());
        };
        let method = frame.method_index;
        let code = self
            .program
            .code
            .get(frame.code_range())
            .ok_or(VmError::CodeOverrun { method })?;
        if frame.ip >= code.len() {
            return Err(VmError::CodeOverrun { method });
        }
        let insn = Instruction::decode(code, frame.ip)?;
        frame.ip = insn.next_offset();
        self.instructions += 1;

        if self.config.trace {
            log::info!(target: TRACE_TARGET, "m{} {} [stack {}]", method, insn, frame.stack_depth());
        } else {
            log::trace!("m{} {}", method, insn);
        }
        self.dispatch(insn)
    }

    fn unwind(&mut self) {
        while let Some(mut frame) = self.frames.pop() {
            for value in frame.drain() {
                self.heap.release_value(value);
            }
        }
    }

    // ===== Frame management =====

    /// Push a frame for `method_index`, moving its arguments off the
    /// caller's operand stack into the callee's low locals.
    pub(crate) fn invoke(&mut self, method_index: u16) -> Result<(), VmError> {
        let method = *self
            .program
            .method(method_index)
            .ok_or(VmError::MissingMethod(method_index))?;
        if self.frames.len() >= self.config.max_frames {
            return Err(VmError::CallStackOverflow {
                limit: self.config.max_frames,
            });
        }
        let caller = self.current_frame_mut()?;
        let args = caller.pop_many(usize::from(method.param_count))?;
        let mut frame = CallFrame::new(method_index, &method, Some(caller.ip));
        frame.bind_arguments(args);
        self.frames.push(frame);
        Ok(())
    }

    /// Pop the current frame, releasing its locals and leftover operands,
    /// and hand `result` to the caller. Returning from the outermost frame
    /// halts; an integer result becomes the exit code.
    pub(crate) fn return_from_frame(&mut self, result: Option<Value>) -> Result<(), VmError> {
        if let Some(mut finished) = self.frames.pop() {
            for value in finished.drain() {
                self.heap.release_value(value);
            }
            if let (Some(caller), Some(resume)) = (self.frames.last_mut(), finished.return_address) {
                caller.ip = resume;
            }
        }

        if !self.frames.is_empty() {
            return match result {
                Some(value) => self.push(value),
                None => Ok(()),
            };
        }

        if let Some(value) = result {
            if let Ok(code) = self.heap.unbox_int(&value) {
                self.exit_code = code;
            }
            self.heap.release_value(value);
        }
        self.state = VmState::Halted;
        log::debug!(
            "vm halted with exit code {} after {} instructions",
            self.exit_code,
            self.instructions
        );
        Ok(())
    }

    // ===== Operand helpers =====

    pub(crate) fn current_frame_mut(&mut self) -> Result<&mut CallFrame, VmError> {
        self.frames.last_mut().ok_or(VmError::OperandStackUnderflow)
    }

    /// Push onto the current frame; an overflowing value is released.
    pub(crate) fn push(&mut self, value: Value) -> Result<(), VmError> {
        let Some(frame) = self.frames.last_mut() else {
            self.heap.release_value(value);
            return Err(VmError::OperandStackUnderflow);
        };
        let capacity = frame.max_stack();
        frame.push(value).map_err(|rejected| {
            self.heap.release_value(rejected);
            VmError::OperandStackOverflow { capacity }
        })
    }

    pub(crate) fn pop(&mut self) -> Result<Value, VmError> {
        self.current_frame_mut()?.pop()
    }

    pub(crate) fn pop_n<const N: usize>(&mut self) -> Result<[Value; N], VmError> {
        self.current_frame_mut()?.pop_n()
    }

    pub(crate) fn push_boxed<T: Boxed>(&mut self, payload: T) -> Result<(), VmError> {
        let value = payload.boxed(&mut self.heap);
        self.push(value)
    }

    /// Pop a boxed scalar; the box is released whether or not it matched.
    pub(crate) fn pop_boxed<T: Boxed>(&mut self) -> Result<T, VmError> {
        let value = self.pop()?;
        let payload = T::unboxed(&self.heap, &value);
        self.heap.release_value(value);
        payload
    }

    pub(crate) fn discard<I: IntoIterator<Item = Value>>(&mut self, values: I) {
        for value in values {
            self.heap.release_value(value);
        }
    }

    // ===== Accessors =====

    /// Current state
    pub fn state(&self) -> VmState {
        self.state
    }

    /// Exit code: the outermost frame's integer return value, else 0
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Error that halted the VM, if any
    pub fn error(&self) -> Option<&VmError> {
        self.error.as_ref()
    }

    /// The object heap
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Registry built from the program's classes
    pub fn registry(&self) -> &TypeRegistry {
        &self.linkage.registry
    }

    /// The program being executed
    pub fn program(&self) -> &Arc<ProgramImage> {
        &self.program
    }

    /// Configuration the VM was created with
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Writer receiving `print` output
    pub fn output(&self) -> &W {
        &self.output
    }

    /// Innermost frame
    pub fn current_frame(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    /// Number of active frames
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Instructions executed so far
    pub fn instructions_executed(&self) -> u64 {
        self.instructions
    }
}

impl<W: Write> Drop for Vm<W> {
    fn drop(&mut self) {
        self.unwind();
    }
}
