//! Compiled Night programs: a main stream plus the user function table.

use std::collections::HashMap;

use crate::bytecode::Bytecode;
use crate::SymbolId;

/// A compiled user function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Function {
    /// Parameter Symbol IDs in declaration order.
    pub params: Vec<SymbolId>,
    /// The function body.
    pub code: Bytecode,
}

impl Function {
    /// Create a function from its parameters and body.
    pub fn new(params: Vec<SymbolId>, code: Bytecode) -> Self {
        Self { params, code }
    }

    /// Number of declared parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// User functions keyed by Symbol ID. Built-ins never appear here.
pub type FunctionTable = HashMap<SymbolId, Function>;

/// A complete program ready to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    /// The top-level instruction stream.
    pub main: Bytecode,
    /// Every user function the main stream or another function may call.
    pub functions: FunctionTable,
}

impl Program {
    /// Create a program with no functions.
    pub fn new(main: Bytecode) -> Self {
        Self {
            main,
            functions: FunctionTable::new(),
        }
    }

    /// Create a program from a main stream and function table.
    pub fn with_functions(main: Bytecode, functions: FunctionTable) -> Self {
        Self { main, functions }
    }

    /// Look up a user function.
    pub fn function(&self, id: SymbolId) -> Option<&Function> {
        self.functions.get(&id)
    }

    /// Function IDs in ascending order, for stable iteration.
    pub fn function_ids(&self) -> Vec<SymbolId> {
        let mut ids: Vec<_> = self.functions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction;
    use crate::opcode::Opcode;

    #[test]
    fn empty_program() {
        let program = Program::default();
        assert!(program.main.is_empty());
        assert!(program.functions.is_empty());
    }

    #[test]
    fn function_lookup_and_ordering() {
        let body = Bytecode::from_instructions(&[
            Instruction::load(70),
            Instruction::op(Opcode::Return),
        ]);
        let mut functions = FunctionTable::new();
        functions.insert(80, Function::new(vec![], Bytecode::new()));
        functions.insert(65, Function::new(vec![70], body.clone()));

        let program = Program::with_functions(Bytecode::new(), functions);
        assert_eq!(program.function_ids(), vec![65, 80]);
        assert_eq!(program.function(65).map(Function::arity), Some(1));
        assert_eq!(program.function(65).map(|f| &f.code), Some(&body));
        assert!(program.function(3).is_none());
    }
}
