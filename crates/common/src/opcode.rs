//! Opcode definitions for the Night instruction set.
//!
//! Every instruction starts with one opcode byte. The opcode alone
//! determines how many operand bytes follow ([`OperandLayout`]) and what the
//! instruction does to the operand stack ([`StackEffect`]).

use crate::error::DecodeError;

/// Width in bytes of every Symbol ID, jump offset and element count operand.
pub const WORD: usize = 8;

/// Identifies the operation to perform.
///
/// Type-specialised variants carry an `I` (integer family, including bool
/// and char), `F` (float) or `S` (string) suffix. The generator picks the
/// variant from the static operand types, so the interpreter never has to
/// guess which semantics apply.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // Literals
    /// Push a 1-byte signed integer.
    PushI8 = 0x01,
    /// Push a 2-byte signed integer.
    PushI16 = 0x02,
    /// Push a 4-byte signed integer.
    PushI32 = 0x03,
    /// Push an 8-byte signed integer.
    PushI64 = 0x04,
    /// Push a 1-byte unsigned integer.
    PushU8 = 0x05,
    /// Push a 2-byte unsigned integer.
    PushU16 = 0x06,
    /// Push a 4-byte unsigned integer.
    PushU32 = 0x07,
    /// Push an 8-byte unsigned integer.
    PushU64 = 0x08,
    /// Push a 4-byte float, widened to 64 bits.
    PushF32 = 0x09,
    /// Push an 8-byte float.
    PushF64 = 0x0A,

    // Unary and arithmetic
    /// Integer negation.
    NegI = 0x10,
    /// Float negation.
    NegF = 0x11,
    /// Logical not of an integer (0 becomes 1, anything else 0).
    NotI = 0x12,
    /// Logical not of a float.
    NotF = 0x13,
    /// Integer addition.
    AddI = 0x14,
    /// Float addition.
    AddF = 0x15,
    /// String concatenation.
    AddS = 0x16,
    /// Integer subtraction (left - right).
    SubI = 0x17,
    /// Float subtraction (left - right).
    SubF = 0x18,
    /// Integer multiplication.
    MulI = 0x19,
    /// Float multiplication.
    MulF = 0x1A,
    /// Integer division. Division by zero is a runtime error.
    DivI = 0x1B,
    /// Float division. Division by zero is a runtime error.
    DivF = 0x1C,
    /// Integer remainder. Zero divisor is a runtime error.
    Mod = 0x1D,

    // Comparison: pop right, pop left, push 1 or 0.
    LtI = 0x20,
    LtF = 0x21,
    LtS = 0x22,
    LeI = 0x23,
    LeF = 0x24,
    LeS = 0x25,
    GtI = 0x26,
    GtF = 0x27,
    GtS = 0x28,
    GeI = 0x29,
    GeF = 0x2A,
    GeS = 0x2B,
    EqI = 0x2C,
    EqF = 0x2D,
    EqS = 0x2E,
    NeI = 0x2F,
    NeF = 0x30,
    NeS = 0x31,

    // Logical
    /// Both operands truthy.
    And = 0x38,
    /// Either operand truthy.
    Or = 0x39,

    // Numeric conversions inserted by the generator
    /// Integer to float.
    IntToFloat = 0x3C,
    /// Float to signed integer, truncating toward zero.
    FloatToInt = 0x3D,
    /// Float to 0 or 1.
    FloatToBool = 0x3E,

    // Memory
    /// Push the value stored under a Symbol ID.
    Load = 0x40,
    /// Pop a value and store it under a Symbol ID.
    Store = 0x41,
    /// Pop `depth` indices and push the element they address inside a variable.
    LoadElem = 0x42,
    /// Pop a value, then `depth` indices, and overwrite the addressed element.
    StoreIndex = 0x43,
    /// Pop an index, pop a string or array, push the element.
    Index = 0x44,

    // Allocation
    /// Pop `count` character codes and build a string.
    AllocateString = 0x50,
    /// Pop `count` values and build an array.
    AllocateArray = 0x51,
    /// Pop `dims` sizes and build a zero-filled nested array.
    AllocateArrayFilled = 0x52,

    // Control and calls
    /// Jump forward by the offset operand.
    Jump = 0x60,
    /// Jump backward by the offset operand.
    JumpBackward = 0x61,
    /// Pop a condition, jump forward if it is false.
    JumpIfFalse = 0x62,
    /// Call a built-in or user function by Symbol ID.
    Call = 0x63,
    /// End the current call, carrying the top of stack if there is one.
    Return = 0x64,
    /// Discard the top of stack.
    Pop = 0x65,
}

/// All valid opcodes, in definition order. Useful for exhaustive testing.
pub const ALL_OPCODES: [Opcode; 61] = [
    Opcode::PushI8,
    Opcode::PushI16,
    Opcode::PushI32,
    Opcode::PushI64,
    Opcode::PushU8,
    Opcode::PushU16,
    Opcode::PushU32,
    Opcode::PushU64,
    Opcode::PushF32,
    Opcode::PushF64,
    Opcode::NegI,
    Opcode::NegF,
    Opcode::NotI,
    Opcode::NotF,
    Opcode::AddI,
    Opcode::AddF,
    Opcode::AddS,
    Opcode::SubI,
    Opcode::SubF,
    Opcode::MulI,
    Opcode::MulF,
    Opcode::DivI,
    Opcode::DivF,
    Opcode::Mod,
    Opcode::LtI,
    Opcode::LtF,
    Opcode::LtS,
    Opcode::LeI,
    Opcode::LeF,
    Opcode::LeS,
    Opcode::GtI,
    Opcode::GtF,
    Opcode::GtS,
    Opcode::GeI,
    Opcode::GeF,
    Opcode::GeS,
    Opcode::EqI,
    Opcode::EqF,
    Opcode::EqS,
    Opcode::NeI,
    Opcode::NeF,
    Opcode::NeS,
    Opcode::And,
    Opcode::Or,
    Opcode::IntToFloat,
    Opcode::FloatToInt,
    Opcode::FloatToBool,
    Opcode::Load,
    Opcode::Store,
    Opcode::LoadElem,
    Opcode::StoreIndex,
    Opcode::Index,
    Opcode::AllocateString,
    Opcode::AllocateArray,
    Opcode::AllocateArrayFilled,
    Opcode::Jump,
    Opcode::JumpBackward,
    Opcode::JumpIfFalse,
    Opcode::Call,
    Opcode::Return,
    Opcode::Pop,
];

/// Shape of the operand bytes that follow an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandLayout {
    /// No operand bytes.
    None,
    /// Little-endian two's complement integer of the given width.
    Signed(usize),
    /// Little-endian unsigned integer of the given width.
    Unsigned(usize),
    /// IEEE 754 float of the given width (4 or 8).
    Float(usize),
    /// One 8-byte word: a Symbol ID, jump offset or count.
    Word,
    /// Two 8-byte words: Symbol ID then subscript depth.
    TwoWords,
    /// One 8-byte dimension count followed by a one-byte fill kind.
    WordAndKind,
}

impl OperandLayout {
    /// Number of operand bytes following the opcode byte.
    pub fn len(&self) -> usize {
        match self {
            OperandLayout::None => 0,
            OperandLayout::Signed(w) | OperandLayout::Unsigned(w) | OperandLayout::Float(w) => *w,
            OperandLayout::Word => WORD,
            OperandLayout::TwoWords => 2 * WORD,
            OperandLayout::WordAndKind => WORD + 1,
        }
    }

    /// Returns true if the opcode is not followed by operand bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What an instruction does to the operand stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackEffect {
    /// Pops and pushes a fixed number of values.
    Fixed { pops: usize, pushes: usize },
    /// Pops as many values as the count operand says, plus `extra`.
    Counted { extra: usize, pushes: usize },
    /// Depends on the callee's parameter count and return type.
    Call,
    /// Leaves the frame, taking the top value with it if there is one.
    Return,
}

impl Opcode {
    /// Decode an opcode byte found at byte offset `at`.
    pub fn from_byte(byte: u8, at: usize) -> Result<Self, DecodeError> {
        match byte {
            0x00 => Err(DecodeError::IllegalOpcode { at }),

            0x01 => Ok(Opcode::PushI8),
            0x02 => Ok(Opcode::PushI16),
            0x03 => Ok(Opcode::PushI32),
            0x04 => Ok(Opcode::PushI64),
            0x05 => Ok(Opcode::PushU8),
            0x06 => Ok(Opcode::PushU16),
            0x07 => Ok(Opcode::PushU32),
            0x08 => Ok(Opcode::PushU64),
            0x09 => Ok(Opcode::PushF32),
            0x0A => Ok(Opcode::PushF64),

            0x10 => Ok(Opcode::NegI),
            0x11 => Ok(Opcode::NegF),
            0x12 => Ok(Opcode::NotI),
            0x13 => Ok(Opcode::NotF),
            0x14 => Ok(Opcode::AddI),
            0x15 => Ok(Opcode::AddF),
            0x16 => Ok(Opcode::AddS),
            0x17 => Ok(Opcode::SubI),
            0x18 => Ok(Opcode::SubF),
            0x19 => Ok(Opcode::MulI),
            0x1A => Ok(Opcode::MulF),
            0x1B => Ok(Opcode::DivI),
            0x1C => Ok(Opcode::DivF),
            0x1D => Ok(Opcode::Mod),

            0x20 => Ok(Opcode::LtI),
            0x21 => Ok(Opcode::LtF),
            0x22 => Ok(Opcode::LtS),
            0x23 => Ok(Opcode::LeI),
            0x24 => Ok(Opcode::LeF),
            0x25 => Ok(Opcode::LeS),
            0x26 => Ok(Opcode::GtI),
            0x27 => Ok(Opcode::GtF),
            0x28 => Ok(Opcode::GtS),
            0x29 => Ok(Opcode::GeI),
            0x2A => Ok(Opcode::GeF),
            0x2B => Ok(Opcode::GeS),
            0x2C => Ok(Opcode::EqI),
            0x2D => Ok(Opcode::EqF),
            0x2E => Ok(Opcode::EqS),
            0x2F => Ok(Opcode::NeI),
            0x30 => Ok(Opcode::NeF),
            0x31 => Ok(Opcode::NeS),

            0x38 => Ok(Opcode::And),
            0x39 => Ok(Opcode::Or),

            0x3C => Ok(Opcode::IntToFloat),
            0x3D => Ok(Opcode::FloatToInt),
            0x3E => Ok(Opcode::FloatToBool),

            0x40 => Ok(Opcode::Load),
            0x41 => Ok(Opcode::Store),
            0x42 => Ok(Opcode::LoadElem),
            0x43 => Ok(Opcode::StoreIndex),
            0x44 => Ok(Opcode::Index),

            0x50 => Ok(Opcode::AllocateString),
            0x51 => Ok(Opcode::AllocateArray),
            0x52 => Ok(Opcode::AllocateArrayFilled),

            0x60 => Ok(Opcode::Jump),
            0x61 => Ok(Opcode::JumpBackward),
            0x62 => Ok(Opcode::JumpIfFalse),
            0x63 => Ok(Opcode::Call),
            0x64 => Ok(Opcode::Return),
            0x65 => Ok(Opcode::Pop),

            _ => Err(DecodeError::ReservedOpcode { at, byte }),
        }
    }

    /// Operand bytes that follow this opcode.
    pub fn operand_layout(&self) -> OperandLayout {
        match self {
            Opcode::PushI8 => OperandLayout::Signed(1),
            Opcode::PushI16 => OperandLayout::Signed(2),
            Opcode::PushI32 => OperandLayout::Signed(4),
            Opcode::PushI64 => OperandLayout::Signed(8),
            Opcode::PushU8 => OperandLayout::Unsigned(1),
            Opcode::PushU16 => OperandLayout::Unsigned(2),
            Opcode::PushU32 => OperandLayout::Unsigned(4),
            Opcode::PushU64 => OperandLayout::Unsigned(8),
            Opcode::PushF32 => OperandLayout::Float(4),
            Opcode::PushF64 => OperandLayout::Float(8),

            Opcode::Load
            | Opcode::Store
            | Opcode::AllocateString
            | Opcode::AllocateArray
            | Opcode::Jump
            | Opcode::JumpBackward
            | Opcode::JumpIfFalse
            | Opcode::Call => OperandLayout::Word,

            Opcode::LoadElem | Opcode::StoreIndex => OperandLayout::TwoWords,
            Opcode::AllocateArrayFilled => OperandLayout::WordAndKind,

            Opcode::NegI
            | Opcode::NegF
            | Opcode::NotI
            | Opcode::NotF
            | Opcode::AddI
            | Opcode::AddF
            | Opcode::AddS
            | Opcode::SubI
            | Opcode::SubF
            | Opcode::MulI
            | Opcode::MulF
            | Opcode::DivI
            | Opcode::DivF
            | Opcode::Mod
            | Opcode::LtI
            | Opcode::LtF
            | Opcode::LtS
            | Opcode::LeI
            | Opcode::LeF
            | Opcode::LeS
            | Opcode::GtI
            | Opcode::GtF
            | Opcode::GtS
            | Opcode::GeI
            | Opcode::GeF
            | Opcode::GeS
            | Opcode::EqI
            | Opcode::EqF
            | Opcode::EqS
            | Opcode::NeI
            | Opcode::NeF
            | Opcode::NeS
            | Opcode::And
            | Opcode::Or
            | Opcode::IntToFloat
            | Opcode::FloatToInt
            | Opcode::FloatToBool
            | Opcode::Index
            | Opcode::Return
            | Opcode::Pop => OperandLayout::None,
        }
    }

    /// Total encoded size of an instruction with this opcode.
    pub fn encoded_len(&self) -> usize {
        1 + self.operand_layout().len()
    }

    /// Stack contract of this opcode.
    pub fn stack_effect(&self) -> StackEffect {
        match self {
            Opcode::PushI8
            | Opcode::PushI16
            | Opcode::PushI32
            | Opcode::PushI64
            | Opcode::PushU8
            | Opcode::PushU16
            | Opcode::PushU32
            | Opcode::PushU64
            | Opcode::PushF32
            | Opcode::PushF64
            | Opcode::Load => StackEffect::Fixed { pops: 0, pushes: 1 },

            Opcode::NegI
            | Opcode::NegF
            | Opcode::NotI
            | Opcode::NotF
            | Opcode::IntToFloat
            | Opcode::FloatToInt
            | Opcode::FloatToBool => StackEffect::Fixed { pops: 1, pushes: 1 },

            Opcode::AddI
            | Opcode::AddF
            | Opcode::AddS
            | Opcode::SubI
            | Opcode::SubF
            | Opcode::MulI
            | Opcode::MulF
            | Opcode::DivI
            | Opcode::DivF
            | Opcode::Mod
            | Opcode::LtI
            | Opcode::LtF
            | Opcode::LtS
            | Opcode::LeI
            | Opcode::LeF
            | Opcode::LeS
            | Opcode::GtI
            | Opcode::GtF
            | Opcode::GtS
            | Opcode::GeI
            | Opcode::GeF
            | Opcode::GeS
            | Opcode::EqI
            | Opcode::EqF
            | Opcode::EqS
            | Opcode::NeI
            | Opcode::NeF
            | Opcode::NeS
            | Opcode::And
            | Opcode::Or
            | Opcode::Index => StackEffect::Fixed { pops: 2, pushes: 1 },

            Opcode::Store | Opcode::JumpIfFalse | Opcode::Pop => {
                StackEffect::Fixed { pops: 1, pushes: 0 }
            }
            Opcode::Jump | Opcode::JumpBackward => StackEffect::Fixed { pops: 0, pushes: 0 },

            Opcode::LoadElem
            | Opcode::AllocateString
            | Opcode::AllocateArray
            | Opcode::AllocateArrayFilled => StackEffect::Counted {
                extra: 0,
                pushes: 1,
            },
            Opcode::StoreIndex => StackEffect::Counted {
                extra: 1,
                pushes: 0,
            },

            Opcode::Call => StackEffect::Call,
            Opcode::Return => StackEffect::Return,
        }
    }

    /// Returns true for the three jump opcodes.
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            Opcode::Jump | Opcode::JumpBackward | Opcode::JumpIfFalse
        )
    }

    /// Returns the mnemonic used by the disassembler.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::PushI8 => "PUSH_I8",
            Opcode::PushI16 => "PUSH_I16",
            Opcode::PushI32 => "PUSH_I32",
            Opcode::PushI64 => "PUSH_I64",
            Opcode::PushU8 => "PUSH_U8",
            Opcode::PushU16 => "PUSH_U16",
            Opcode::PushU32 => "PUSH_U32",
            Opcode::PushU64 => "PUSH_U64",
            Opcode::PushF32 => "PUSH_F32",
            Opcode::PushF64 => "PUSH_F64",
            Opcode::NegI => "NEG_I",
            Opcode::NegF => "NEG_F",
            Opcode::NotI => "NOT_I",
            Opcode::NotF => "NOT_F",
            Opcode::AddI => "ADD_I",
            Opcode::AddF => "ADD_F",
            Opcode::AddS => "ADD_S",
            Opcode::SubI => "SUB_I",
            Opcode::SubF => "SUB_F",
            Opcode::MulI => "MUL_I",
            Opcode::MulF => "MUL_F",
            Opcode::DivI => "DIV_I",
            Opcode::DivF => "DIV_F",
            Opcode::Mod => "MOD",
            Opcode::LtI => "LT_I",
            Opcode::LtF => "LT_F",
            Opcode::LtS => "LT_S",
            Opcode::LeI => "LE_I",
            Opcode::LeF => "LE_F",
            Opcode::LeS => "LE_S",
            Opcode::GtI => "GT_I",
            Opcode::GtF => "GT_F",
            Opcode::GtS => "GT_S",
            Opcode::GeI => "GE_I",
            Opcode::GeF => "GE_F",
            Opcode::GeS => "GE_S",
            Opcode::EqI => "EQ_I",
            Opcode::EqF => "EQ_F",
            Opcode::EqS => "EQ_S",
            Opcode::NeI => "NE_I",
            Opcode::NeF => "NE_F",
            Opcode::NeS => "NE_S",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::IntToFloat => "INT_TO_FLOAT",
            Opcode::FloatToInt => "FLOAT_TO_INT",
            Opcode::FloatToBool => "FLOAT_TO_BOOL",
            Opcode::Load => "LOAD",
            Opcode::Store => "STORE",
            Opcode::LoadElem => "LOAD_ELEM",
            Opcode::StoreIndex => "STORE_INDEX",
            Opcode::Index => "INDEX",
            Opcode::AllocateString => "ALLOCATE_STRING",
            Opcode::AllocateArray => "ALLOCATE_ARRAY",
            Opcode::AllocateArrayFilled => "ALLOCATE_ARRAY_FILLED",
            Opcode::Jump => "JUMP",
            Opcode::JumpBackward => "JUMP_BACKWARD",
            Opcode::JumpIfFalse => "JUMP_IF_FALSE",
            Opcode::Call => "CALL",
            Opcode::Return => "RETURN",
            Opcode::Pop => "POP",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_opcodes_count() {
        assert_eq!(ALL_OPCODES.len(), 61);
    }

    #[test]
    fn roundtrip_all_valid_opcodes() {
        for &opcode in &ALL_OPCODES {
            let byte = opcode as u8;
            let decoded = Opcode::from_byte(byte, 0).unwrap();
            assert_eq!(
                opcode, decoded,
                "roundtrip failed for {opcode:?} ({byte:#04x})"
            );
        }
    }

    #[test]
    fn illegal_opcode_zero() {
        assert_eq!(
            Opcode::from_byte(0x00, 7),
            Err(DecodeError::IllegalOpcode { at: 7 })
        );
    }

    #[test]
    fn gaps_between_families_are_reserved() {
        for byte in (0x0B..=0x0Fu8).chain(0x1E..=0x1F).chain(0x32..=0x37) {
            assert_eq!(
                Opcode::from_byte(byte, 0),
                Err(DecodeError::ReservedOpcode { at: 0, byte }),
                "byte {byte:#04x} should be reserved"
            );
        }
    }

    #[test]
    fn every_byte_value_resolves() {
        for byte in 0..=255u8 {
            match Opcode::from_byte(byte, 0) {
                Ok(op) => assert_eq!(op as u8, byte),
                Err(DecodeError::IllegalOpcode { .. }) | Err(DecodeError::ReservedOpcode { .. }) => {}
                other => panic!("unexpected result for byte {byte:#04x}: {other:?}"),
            }
        }
    }

    #[test]
    fn mnemonics_are_unique_and_uppercase() {
        let mut seen = std::collections::HashSet::new();
        for &opcode in &ALL_OPCODES {
            let m = opcode.mnemonic();
            assert_eq!(m, m.to_uppercase(), "mnemonic should be uppercase: {m}");
            assert!(seen.insert(m), "duplicate mnemonic {m}");
        }
    }

    #[test]
    fn literal_widths() {
        assert_eq!(Opcode::PushI8.encoded_len(), 2);
        assert_eq!(Opcode::PushU16.encoded_len(), 3);
        assert_eq!(Opcode::PushF32.encoded_len(), 5);
        assert_eq!(Opcode::PushI64.encoded_len(), 9);
    }

    #[test]
    fn jumps_use_fixed_width_offsets() {
        for &opcode in &ALL_OPCODES {
            if opcode.is_jump() {
                assert_eq!(opcode.operand_layout(), OperandLayout::Word);
                assert_eq!(opcode.encoded_len(), 1 + WORD);
            }
        }
    }

    #[test]
    fn binary_operators_pop_two_push_one() {
        for op in [Opcode::AddI, Opcode::SubF, Opcode::LtS, Opcode::And, Opcode::Index] {
            assert_eq!(op.stack_effect(), StackEffect::Fixed { pops: 2, pushes: 1 });
        }
    }

    #[test]
    fn store_index_pops_value_beyond_indices() {
        assert_eq!(
            Opcode::StoreIndex.stack_effect(),
            StackEffect::Counted { extra: 1, pushes: 0 }
        );
        assert_eq!(Opcode::StoreIndex.operand_layout(), OperandLayout::TwoWords);
    }
}
