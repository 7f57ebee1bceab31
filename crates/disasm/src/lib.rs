//! Night disassembler: readable listings of instruction streams.
//!
//! Listings are for people debugging the generator. They are not meant to
//! be parsed back.
//!
//! # Usage
//!
//! ```
//! use night_common::{Bytecode, Instruction, Opcode};
//! use night_disasm::disassemble;
//!
//! let code = Bytecode::from_instructions(&[
//!     Instruction::push_int(42),
//!     Instruction::op(Opcode::Return),
//! ]);
//! assert_eq!(disassemble(&code).unwrap(), "0000  PUSH_I8 42\n0002  RETURN\n");
//! ```

mod disassembler;

pub use disassembler::{disassemble, disassemble_program, line};

#[cfg(test)]
mod tests {
    use super::*;
    use night_common::{Builtin, Instruction, Opcode, ValueKind};

    #[test]
    fn jump_lines_show_target() {
        let jump = Instruction::with_word(Opcode::JumpIfFalse, 4);
        assert_eq!(line(2, &jump), "0002  JUMP_IF_FALSE 4 -> 0015");

        let back = Instruction::with_word(Opcode::JumpBackward, 20);
        assert_eq!(line(11, &back), "0011  JUMP_BACKWARD 20 -> 0000");

        let wild = Instruction::with_word(Opcode::JumpBackward, 50);
        assert_eq!(line(0, &wild), "0000  JUMP_BACKWARD 50 -> ?");
    }

    #[test]
    fn builtin_calls_are_named() {
        let call = Instruction::call(Builtin::Len.id());
        assert_eq!(line(0, &call), format!("0000  CALL {} (len)", Builtin::Len.id()));
        assert_eq!(line(0, &Instruction::call(90)), "0000  CALL 90");
    }

    #[test]
    fn compound_operands() {
        assert_eq!(
            line(7, &Instruction::load_elem(64, 2)),
            "0007  LOAD_ELEM 64 2"
        );
        assert_eq!(
            line(0, &Instruction::allocate_filled(3, ValueKind::Float)),
            "0000  ALLOCATE_ARRAY_FILLED 3 float"
        );
        assert_eq!(line(0, &Instruction::push_float(2.5)), "0000  PUSH_F32 2.5");
        assert_eq!(line(0, &Instruction::push_int(-300)), "0000  PUSH_I16 -300");
    }
}
