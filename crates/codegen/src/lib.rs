//! Night code generator: lowers type-checked syntax trees to bytecode.
//!
//! The input tree comes from the front end with every name resolved to a
//! Symbol ID and every expression typed. The generator only picks opcodes,
//! lays out control flow and patches jump offsets.
//!
//! # Usage
//!
//! ```
//! use night_codegen::ast::{BinaryOp, Expr, Stmt, Type};
//! use night_codegen::compile_program;
//!
//! // x: int = 2; return x * 21;
//! let x = 64;
//! let program = compile_program(&[
//!     Stmt::VarInit { id: x, ty: Type::INT, sizes: vec![], init: Some(Expr::int(2)) },
//!     Stmt::Return(Some(Expr::binary(
//!         BinaryOp::Mul,
//!         Expr::var(x, Type::INT),
//!         Expr::int(21),
//!         Type::INT,
//!     ))),
//! ])
//! .unwrap();
//! assert!(program.main.check_jump_targets().is_ok());
//! ```

pub mod ast;
pub mod context;
pub mod emitter;
pub mod error;
mod generate;

pub use context::CompileContext;
pub use emitter::{Emitter, JumpSite};
pub use error::CodegenError;
pub use generate::Generator;

use night_common::{Bytecode, Program};

use ast::Stmt;

/// Compile top-level statements into a stream, collecting any function
/// declarations into `ctx`.
pub fn compile(stmts: &[Stmt], ctx: &mut CompileContext) -> Result<Bytecode, CodegenError> {
    let mut generator = Generator::new(ctx);
    generator.stmts(stmts)?;
    Ok(generator.finish())
}

/// Compile a whole program with a fresh context.
pub fn compile_program(stmts: &[Stmt]) -> Result<Program, CodegenError> {
    let mut ctx = CompileContext::new();
    let main = compile(stmts, &mut ctx)?;
    Ok(ctx.into_program(main))
}
