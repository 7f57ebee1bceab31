//! Byte-stream builder with placeholder jumps.
//!
//! Forward jumps are emitted with a zero offset and patched once the code
//! they skip has been emitted. Offsets are fixed-width words, so patching
//! never moves any other byte.

use night_common::{Bytecode, Instruction, Opcode};
use tracing::trace;

use crate::error::CodegenError;

/// A forward jump waiting for its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "an unpatched jump skips zero bytes"]
pub struct JumpSite {
    at: usize,
    len: usize,
}

#[derive(Debug, Default)]
pub struct Emitter {
    code: Bytecode,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset the next instruction will be written at.
    pub fn here(&self) -> usize {
        self.code.len()
    }

    pub fn emit(&mut self, instr: Instruction) -> usize {
        self.code.push(&instr)
    }

    pub fn emit_op(&mut self, opcode: Opcode) -> usize {
        self.emit(Instruction::op(opcode))
    }

    /// Emit `JUMP` or `JUMP_IF_FALSE` with a placeholder offset.
    pub fn emit_jump(&mut self, opcode: Opcode) -> JumpSite {
        let instr = Instruction::with_word(opcode, 0);
        let at = self.emit(instr);
        JumpSite {
            at,
            len: instr.len(),
        }
    }

    /// Point `site` at the current end of the stream.
    pub fn patch_to_here(&mut self, site: JumpSite) -> Result<(), CodegenError> {
        let offset = self.here() - (site.at + site.len);
        trace!(at = site.at, offset, "patch forward jump");
        self.code.patch_word(site.at, offset as u64)?;
        Ok(())
    }

    /// Emit `JUMP_BACKWARD` landing on `target`, an earlier boundary.
    pub fn emit_jump_back(&mut self, target: usize) {
        let placeholder = Instruction::with_word(Opcode::JumpBackward, 0);
        let offset = self.here() + placeholder.len() - target;
        trace!(at = self.here(), target, offset, "backward jump");
        self.emit(Instruction::with_word(Opcode::JumpBackward, offset as u64));
    }

    pub fn finish(self) -> Bytecode {
        self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use night_common::jump_target;

    #[test]
    fn forward_patch_skips_body() {
        let mut e = Emitter::new();
        let site = e.emit_jump(Opcode::Jump);
        e.emit(Instruction::push_int(1));
        e.emit_op(Opcode::Pop);
        e.patch_to_here(site).unwrap();
        let code = e.finish();

        let jump = code.decode_at(0).unwrap();
        assert_eq!(jump.word(), Some(3));
        assert_eq!(jump_target(0, &jump), Some(code.len()));
        code.check_jump_targets().unwrap();
    }

    #[test]
    fn backward_jump_to_start() {
        let mut e = Emitter::new();
        e.emit(Instruction::push_int(7));
        e.emit_op(Opcode::Pop);
        e.emit_jump_back(0);
        let code = e.finish();

        let at = 3;
        let jump = code.decode_at(at).unwrap();
        assert_eq!(jump.opcode, Opcode::JumpBackward);
        assert_eq!(jump_target(at, &jump), Some(0));
    }

    #[test]
    fn patching_keeps_length() {
        let mut e = Emitter::new();
        let site = e.emit_jump(Opcode::JumpIfFalse);
        let before = e.here();
        e.patch_to_here(site).unwrap();
        assert_eq!(e.here(), before);
    }
}
