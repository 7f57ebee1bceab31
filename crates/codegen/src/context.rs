//! Compilation state threaded through the generator.

use night_common::{Builtin, Bytecode, Function, FunctionTable, Program, SymbolId, RESERVED_IDS};
use tracing::debug;

use crate::error::CodegenError;

/// Symbol ID allocator plus the table of compiled user functions.
#[derive(Debug)]
pub struct CompileContext {
    next_id: SymbolId,
    functions: FunctionTable,
}

impl Default for CompileContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CompileContext {
    pub fn new() -> Self {
        Self {
            next_id: RESERVED_IDS,
            functions: FunctionTable::new(),
        }
    }

    /// Hand out the next unused Symbol ID.
    ///
    /// IDs start at [`RESERVED_IDS`]; everything below belongs to built-ins.
    pub fn allocate_id(&mut self) -> Result<SymbolId, CodegenError> {
        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or(CodegenError::IdSpaceExhausted)?;
        Ok(id)
    }

    /// Number of parameters of a declared user function.
    pub fn arity(&self, id: SymbolId) -> Option<usize> {
        self.functions.get(&id).map(Function::arity)
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    /// Register a function's parameters ahead of its body.
    pub(crate) fn declare_function(
        &mut self,
        id: SymbolId,
        params: &[SymbolId],
    ) -> Result<(), CodegenError> {
        if Builtin::is_reserved(id) {
            return Err(CodegenError::ReservedId { id });
        }
        if self.functions.contains_key(&id) {
            return Err(CodegenError::DuplicateFunction { id });
        }
        self.functions
            .insert(id, Function::new(params.to_vec(), Bytecode::new()));
        Ok(())
    }

    /// Attach the compiled body of a declared function.
    pub(crate) fn define_function(&mut self, id: SymbolId, code: Bytecode) {
        debug!(id, bytes = code.len(), "compiled function");
        if let Some(function) = self.functions.get_mut(&id) {
            function.code = code;
        }
    }

    /// Pair the top-level stream with every compiled function.
    pub fn into_program(self, main: Bytecode) -> Program {
        Program::with_functions(main, self.functions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_after_builtins() {
        let mut ctx = CompileContext::new();
        assert_eq!(ctx.allocate_id(), Ok(RESERVED_IDS));
        assert_eq!(ctx.allocate_id(), Ok(RESERVED_IDS + 1));
    }

    #[test]
    fn id_space_exhaustion() {
        let mut ctx = CompileContext {
            next_id: SymbolId::MAX,
            functions: FunctionTable::new(),
        };
        assert_eq!(ctx.allocate_id(), Err(CodegenError::IdSpaceExhausted));
    }

    #[test]
    fn duplicate_and_reserved_functions() {
        let mut ctx = CompileContext::new();
        ctx.declare_function(70, &[71, 72]).unwrap();
        assert_eq!(ctx.arity(70), Some(2));
        assert_eq!(
            ctx.declare_function(70, &[]),
            Err(CodegenError::DuplicateFunction { id: 70 })
        );
        assert_eq!(
            ctx.declare_function(3, &[]),
            Err(CodegenError::ReservedId { id: 3 })
        );
    }
}
