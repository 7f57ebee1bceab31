//! Interpreter state: limits, call frames and I/O handles.

use std::io::{BufRead, Write};

use night_common::{Bytecode, FunctionTable, Value};

use crate::error::RuntimeError;
use crate::scope::Scope;

/// Default maximum operand stack depth of a single frame.
pub const MAX_STACK_DEPTH: usize = 4096;

/// Default maximum nesting of user function calls.
pub const MAX_CALL_DEPTH: usize = 1024;

/// Default maximum number of values one array allocation may create.
pub const MAX_ARRAY_LEN: usize = 1 << 22;

/// Resource limits enforced while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Values one frame's operand stack may hold.
    pub max_stack_depth: usize,
    /// User calls that may be active at once.
    pub max_call_depth: usize,
    /// Values a single `ALLOCATE_ARRAY_FILLED` may create, counting every level.
    pub max_array_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_stack_depth: MAX_STACK_DEPTH,
            max_call_depth: MAX_CALL_DEPTH,
            max_array_len: MAX_ARRAY_LEN,
        }
    }
}

/// Execution state of one stream: the main body or one active user call.
#[derive(Debug)]
pub(crate) struct Frame<'c> {
    /// The stream being executed.
    pub(crate) code: &'c Bytecode,
    /// Operand stack.
    pub(crate) stack: Vec<Value>,
    /// Offset of the next instruction to decode.
    pub(crate) ip: usize,
    /// Offset of the instruction currently executing.
    pub(crate) at: usize,
    max_stack_depth: usize,
}

impl<'c> Frame<'c> {
    pub(crate) fn new(code: &'c Bytecode, max_stack_depth: usize) -> Self {
        Self {
            code,
            stack: Vec::new(),
            ip: 0,
            at: 0,
            max_stack_depth,
        }
    }

    /// Push a value onto the stack, checking for overflow.
    pub(crate) fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() >= self.max_stack_depth {
            return Err(RuntimeError::StackOverflow { at: self.at });
        }
        self.stack.push(value);
        Ok(())
    }

    /// Pop a value from the stack.
    pub(crate) fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack
            .pop()
            .ok_or(RuntimeError::StackUnderflow { at: self.at })
    }

    /// Pop `count` values, returned in the order they were pushed.
    pub(crate) fn pop_n(&mut self, count: u64) -> Result<Vec<Value>, RuntimeError> {
        let count = usize::try_from(count)
            .ok()
            .filter(|&n| n <= self.stack.len())
            .ok_or(RuntimeError::StackUnderflow { at: self.at })?;
        let split = self.stack.len() - count;
        Ok(self.stack.split_off(split))
    }
}

/// The Night stack machine.
///
/// The function table is shared read-only by every call. Globals are
/// passed to [`Interpreter::run`] so the caller keeps them after the run.
pub struct Interpreter<'a, R, W> {
    pub(crate) functions: &'a FunctionTable,
    pub(crate) input: R,
    pub(crate) output: W,
    pub(crate) limits: Limits,
}

impl<'a, R: BufRead, W: Write> Interpreter<'a, R, W> {
    /// Create an interpreter with default limits.
    pub fn new(functions: &'a FunctionTable, input: R, output: W) -> Self {
        Self {
            functions,
            input,
            output,
            limits: Limits::default(),
        }
    }

    /// Replace the resource limits.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Run `code` as the top-level stream against `globals`.
    ///
    /// Returns the value carried by a top-level `RETURN`, or `None` when the
    /// stream runs off its end or returns with an empty stack.
    pub fn run(
        &mut self,
        code: &Bytecode,
        globals: &mut Scope,
    ) -> Result<Option<Value>, RuntimeError> {
        self.execute(code, globals)
    }

    /// Consume the interpreter and hand back its output sink.
    pub fn into_output(self) -> W {
        self.output
    }
}
