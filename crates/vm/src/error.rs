//! Runtime errors for the Night interpreter.
//!
//! Every error that arises while running an instruction stream carries the
//! byte offset (`at`) of the instruction that raised it.

use night_common::{DecodeError, SymbolId, ValueKind};
use thiserror::Error;

/// Errors that halt program execution.
///
/// Most variants are user-facing runtime errors. The ones reported by
/// [`RuntimeError::is_internal`] can only come from a malformed stream or
/// an ill-typed tree, and indicate a front end or code generator defect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// Integer division, modulo or float division by zero.
    #[error("division by zero at byte {at}")]
    DivisionByZero { at: usize },

    /// Subscript outside the string or array.
    #[error("index {index} out of bounds (length {length}) at byte {at}")]
    IndexOutOfBounds { at: usize, index: i64, length: usize },

    /// Array allocation with a negative dimension.
    #[error("negative array size {size} at byte {at}")]
    NegativeSize { at: usize, size: i64 },

    /// Pop on an empty operand stack.
    #[error("stack underflow at byte {at}")]
    StackUnderflow { at: usize },

    /// Operand stack grew past the configured limit.
    #[error("stack overflow at byte {at}")]
    StackOverflow { at: usize },

    /// Nested user calls went past the configured limit.
    #[error("call depth exceeded limit {limit} at byte {at}")]
    CallDepthExceeded { at: usize, limit: usize },

    /// `ALLOCATE_ARRAY_FILLED` asked for more values than the configured limit.
    #[error("array allocation exceeds {limit} values at byte {at}")]
    ArrayTooLarge { at: usize, limit: usize },

    /// A built-in conversion could not parse or represent its argument.
    #[error("cannot convert {value:?} to {target} at byte {at}")]
    InvalidConversion {
        at: usize,
        value: String,
        target: &'static str,
    },

    /// Integer is not a valid character code.
    #[error("invalid character code {code} at byte {at}")]
    InvalidChar { at: usize, code: i64 },

    /// `LOAD` of an ID that was never stored.
    #[error("undefined variable {id} at byte {at}")]
    UndefinedVariable { at: usize, id: SymbolId },

    /// Operand of the wrong kind for the opcode.
    #[error("{op} cannot operate on {found} at byte {at}")]
    TypeMismatch {
        at: usize,
        op: &'static str,
        found: ValueKind,
    },

    /// `CALL` with an ID that is neither a built-in nor a user function.
    #[error("unknown function {id} at byte {at}")]
    UnknownFunction { at: usize, id: SymbolId },

    /// Reading input or writing output failed.
    #[error("I/O error at byte {at}: {message}")]
    Io { at: usize, message: String },

    /// The stream could not be decoded.
    #[error("malformed instruction stream: {source}")]
    Decode {
        #[from]
        source: DecodeError,
    },

    /// A jump leaves the stream.
    #[error("jump at byte {at} leaves the stream")]
    JumpOutOfBounds { at: usize },

    /// Operand shape does not match the opcode.
    #[error("operand does not match opcode at byte {at}")]
    InvalidOperand { at: usize },
}

impl RuntimeError {
    /// Returns true for errors that well-typed generated code never causes.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            RuntimeError::Decode { .. }
                | RuntimeError::JumpOutOfBounds { .. }
                | RuntimeError::InvalidOperand { .. }
                | RuntimeError::TypeMismatch { .. }
                | RuntimeError::UnknownFunction { .. }
                | RuntimeError::UndefinedVariable { .. }
        )
    }
}
