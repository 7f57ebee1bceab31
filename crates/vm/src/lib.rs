//! Night interpreter: executes compiled instruction streams.
//!
//! The interpreter is a stack machine with:
//! - An operand stack per frame for intermediate values
//! - A global [`Scope`] shared by every frame, plus a local scope per user call
//! - One dispatch loop over an explicit frame stack, so call depth is
//!   bounded by [`Limits`] rather than the native stack
//!
//! # Usage
//!
//! ```
//! use night_common::{Bytecode, Instruction, Opcode, Program, Value};
//! use night_vm::{run, Scope};
//!
//! let main = Bytecode::from_instructions(&[
//!     Instruction::push_int(40),
//!     Instruction::push_int(2),
//!     Instruction::op(Opcode::AddI),
//!     Instruction::op(Opcode::Return),
//! ]);
//!
//! let mut globals = Scope::new();
//! let result = run(&Program::new(main), &mut globals).unwrap();
//! assert_eq!(result, Some(Value::Int(42)));
//! ```

mod builtins;
pub mod error;
mod execute;
pub mod machine;
pub mod scope;

pub use error::RuntimeError;
pub use machine::{Interpreter, Limits, MAX_ARRAY_LEN, MAX_CALL_DEPTH, MAX_STACK_DEPTH};
pub use scope::{Scope, Scopes};

use std::io::{BufRead, Write};

use night_common::{Program, Value};
use tracing::debug;

/// Execute a program against `globals`, using stdin and stdout for the
/// input and print built-ins.
///
/// # Errors
///
/// Returns [`RuntimeError`] if execution fails (division by zero,
/// out-of-bounds subscript, failed conversion, malformed stream, ...).
pub fn run(program: &Program, globals: &mut Scope) -> Result<Option<Value>, RuntimeError> {
    let stdin = std::io::stdin();
    run_with_io(program, globals, stdin.lock(), std::io::stdout())
}

/// Execute a program with explicit input and output handles.
pub fn run_with_io<R: BufRead, W: Write>(
    program: &Program,
    globals: &mut Scope,
    input: R,
    output: W,
) -> Result<Option<Value>, RuntimeError> {
    debug!(
        bytes = program.main.len(),
        functions = program.functions.len(),
        "running program"
    );
    let mut interpreter = Interpreter::new(&program.functions, input, output);
    let result = interpreter.run(&program.main, globals);
    if let Err(e) = &result {
        debug!(error = %e, internal = e.is_internal(), "execution failed");
    }
    result
}
