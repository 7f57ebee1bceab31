//! Code generation errors.
//!
//! The generator trusts the front end's type checking. Each of these
//! errors means the tree it was handed breaks that contract, so they are
//! defects to fix upstream rather than user diagnostics.

use night_common::{DecodeError, SymbolId};
use thiserror::Error;

use crate::ast::Type;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    /// Operator has no opcode for the operand types.
    #[error("operator '{op}' is not defined for {ty}")]
    UnsupportedOperator { op: &'static str, ty: Type },

    /// An expression that must produce a value has no type.
    #[error("{what} has no type")]
    MissingType { what: &'static str },

    /// Two function declarations share one Symbol ID.
    #[error("function {id} is declared twice")]
    DuplicateFunction { id: SymbolId },

    /// Subscript applied to a type with no elements.
    #[error("cannot subscript a value of type {ty}")]
    SubscriptOnScalar { ty: Type },

    /// A reserved ID that names no built-in, or a user declaration inside
    /// the reserved range.
    #[error("Symbol ID {id} is reserved for built-ins")]
    ReservedId { id: SymbolId },

    /// No Symbol IDs are left to allocate.
    #[error("Symbol ID space exhausted")]
    IdSpaceExhausted,

    /// Call with the wrong number of arguments.
    #[error("function {id} takes {expected} arguments, {found} given")]
    ArityMismatch {
        id: SymbolId,
        expected: usize,
        found: usize,
    },

    /// Patching a jump placeholder failed.
    #[error("jump patch failed: {0}")]
    Patch(#[from] DecodeError),
}
