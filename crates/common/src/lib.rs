//! Night common types and instruction encoding.
//!
//! This crate provides the data structures shared by the Night code
//! generator, interpreter and disassembler:
//!
//! - [`Opcode`]: the instruction set, with operand layouts and stack effects
//! - [`Instruction`]: one decoded instruction with encode/decode
//! - [`Bytecode`]: a packed instruction stream with jump patching
//! - [`Value`] and [`ValueKind`]: runtime values
//! - [`Program`] and [`Function`]: a main stream plus user functions
//! - [`Builtin`]: the reserved-ID native function table
//! - [`DecodeError`]: errors from decoding byte streams

pub mod builtin;
pub mod bytecode;
pub mod error;
pub mod instruction;
pub mod kind;
pub mod opcode;
pub mod program;
pub mod value;

/// Integer identity of a variable or function, resolved by the front end.
pub type SymbolId = u64;

// Re-export commonly used types at the crate root.
pub use builtin::{Builtin, RESERVED_IDS};
pub use bytecode::{jump_target, Bytecode};
pub use error::DecodeError;
pub use instruction::{Instruction, Operand};
pub use kind::ValueKind;
pub use opcode::{Opcode, OperandLayout, StackEffect};
pub use program::{Function, FunctionTable, Program};
pub use value::Value;

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Strategy that generates a random valid Opcode.
    fn arb_opcode() -> impl Strategy<Value = Opcode> {
        prop::sample::select(&opcode::ALL_OPCODES[..])
    }

    fn arb_kind() -> impl Strategy<Value = ValueKind> {
        prop::sample::select(&kind::ALL_VALUE_KINDS[..])
    }

    /// Strategy that generates an instruction whose operand matches its layout.
    fn arb_instruction() -> impl Strategy<Value = Instruction> {
        (
            arb_opcode(),
            any::<u64>(),
            any::<u64>(),
            -1.0e30f32..1.0e30f32,
            -1.0e300f64..1.0e300f64,
            arb_kind(),
        )
            .prop_map(|(opcode, a, b, narrow, wide, kind)| {
                let operand = match opcode.operand_layout() {
                    OperandLayout::None => Operand::None,
                    OperandLayout::Signed(w) => {
                        let shift = 64 - 8 * w as u32;
                        Operand::Int(((a << shift) as i64) >> shift)
                    }
                    OperandLayout::Unsigned(w) => {
                        let shift = 64 - 8 * w as u32;
                        Operand::UInt((a << shift) >> shift)
                    }
                    OperandLayout::Float(4) => Operand::Float(narrow as f64),
                    OperandLayout::Float(_) => Operand::Float(wide),
                    OperandLayout::Word => Operand::Word(a),
                    OperandLayout::TwoWords => Operand::Element { id: a, depth: b },
                    OperandLayout::WordAndKind => Operand::Fill { dims: a, kind },
                };
                Instruction { opcode, operand }
            })
    }

    proptest! {
        /// For all valid instructions, encode then decode produces the original.
        #[test]
        fn encode_decode_roundtrip(instr in arb_instruction()) {
            let bytes = instr.encode();
            prop_assert_eq!(bytes.len(), instr.len());
            let decoded = Instruction::decode(&bytes, 0).unwrap();
            prop_assert_eq!(instr, decoded);
        }

        /// Random bytes either decode (and re-encode to the same prefix)
        /// or fail with a decode error.
        #[test]
        fn random_bytes_decode(bytes in prop::collection::vec(any::<u8>(), 1..24)) {
            match Instruction::decode(&bytes, 0) {
                Ok(instr) => {
                    if instr.opcode != Opcode::PushF32 {
                        prop_assert_eq!(&instr.encode()[..], &bytes[..instr.len()]);
                    }
                }
                Err(e) => match e {
                    DecodeError::IllegalOpcode { .. }
                    | DecodeError::ReservedOpcode { .. }
                    | DecodeError::TruncatedOperand { .. }
                    | DecodeError::InvalidValueKind { .. } => {}
                    other => prop_assert!(false, "unexpected error {other:?}"),
                },
            }
        }

        /// A packed stream decodes back into exactly its instructions.
        #[test]
        fn stream_boundaries(instrs in prop::collection::vec(arb_instruction(), 0..50)) {
            let code = Bytecode::from_instructions(&instrs);
            let boundaries = code.boundaries().unwrap();
            prop_assert_eq!(boundaries.len(), instrs.len() + 1);
            prop_assert_eq!(*boundaries.last().unwrap(), code.len());
            for (at, instr) in boundaries.iter().zip(&instrs) {
                prop_assert_eq!(code.decode_at(*at).unwrap(), *instr);
            }
        }

        /// Narrowest-width integer literals always roundtrip.
        #[test]
        fn int_literals_roundtrip(v in any::<i64>()) {
            let instr = Instruction::push_int(v);
            prop_assert_eq!(Instruction::decode(&instr.encode(), 0).unwrap().operand, Operand::Int(v));
        }
    }
}
