//! Instruction encoding and decoding for the Night instruction set.
//!
//! An instruction is one opcode byte followed by the operand bytes its
//! [`OperandLayout`] calls for, all little-endian:
//! ```text
//! PUSH_I8      05 | 2a                      push 42
//! LOAD         40 | 41 00 00 00 00 00 00 00 push variable 65
//! LOAD_ELEM    42 | <id: 8 bytes> <depth: 8 bytes>
//! ALLOCATE_ARRAY_FILLED 52 | <dims: 8 bytes> <kind: 1 byte>
//! ```

use crate::error::DecodeError;
use crate::kind::ValueKind;
use crate::opcode::{Opcode, OperandLayout, WORD};
use crate::SymbolId;

/// Decoded operand of an instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    /// No operand bytes.
    None,
    /// Signed integer literal.
    Int(i64),
    /// Unsigned integer literal.
    UInt(u64),
    /// Float literal.
    Float(f64),
    /// Symbol ID, jump offset or count.
    Word(u64),
    /// Variable plus number of subscripts (`LOAD_ELEM`, `STORE_INDEX`).
    Element { id: SymbolId, depth: u64 },
    /// Dimension count plus leaf kind (`ALLOCATE_ARRAY_FILLED`).
    Fill { dims: u64, kind: ValueKind },
}

/// A single Night instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instruction {
    /// The operation to perform.
    pub opcode: Opcode,
    /// Operand; its shape must match `opcode.operand_layout()`.
    pub operand: Operand,
}

impl Instruction {
    /// Instruction without operand bytes.
    pub fn op(opcode: Opcode) -> Self {
        Self {
            opcode,
            operand: Operand::None,
        }
    }

    /// Instruction with a single word operand (ID, offset or count).
    pub fn with_word(opcode: Opcode, word: u64) -> Self {
        Self {
            opcode,
            operand: Operand::Word(word),
        }
    }

    /// Push a signed integer using the narrowest literal that holds it.
    pub fn push_int(value: i64) -> Self {
        let opcode = if i8::try_from(value).is_ok() {
            Opcode::PushI8
        } else if i16::try_from(value).is_ok() {
            Opcode::PushI16
        } else if i32::try_from(value).is_ok() {
            Opcode::PushI32
        } else {
            Opcode::PushI64
        };
        Self {
            opcode,
            operand: Operand::Int(value),
        }
    }

    /// Push an unsigned integer using the narrowest literal that holds it.
    pub fn push_uint(value: u64) -> Self {
        let opcode = if u8::try_from(value).is_ok() {
            Opcode::PushU8
        } else if u16::try_from(value).is_ok() {
            Opcode::PushU16
        } else if u32::try_from(value).is_ok() {
            Opcode::PushU32
        } else {
            Opcode::PushU64
        };
        Self {
            opcode,
            operand: Operand::UInt(value),
        }
    }

    /// Push a float, using 4 bytes only when that loses nothing.
    pub fn push_float(value: f64) -> Self {
        let narrow = (value as f32) as f64;
        let opcode = if narrow.to_bits() == value.to_bits() {
            Opcode::PushF32
        } else {
            Opcode::PushF64
        };
        Self {
            opcode,
            operand: Operand::Float(value),
        }
    }

    /// `LOAD id`.
    pub fn load(id: SymbolId) -> Self {
        Self::with_word(Opcode::Load, id)
    }

    /// `STORE id`.
    pub fn store(id: SymbolId) -> Self {
        Self::with_word(Opcode::Store, id)
    }

    /// `CALL id`.
    pub fn call(id: SymbolId) -> Self {
        Self::with_word(Opcode::Call, id)
    }

    /// `LOAD_ELEM id depth`.
    pub fn load_elem(id: SymbolId, depth: u64) -> Self {
        Self {
            opcode: Opcode::LoadElem,
            operand: Operand::Element { id, depth },
        }
    }

    /// `STORE_INDEX id depth`.
    pub fn store_index(id: SymbolId, depth: u64) -> Self {
        Self {
            opcode: Opcode::StoreIndex,
            operand: Operand::Element { id, depth },
        }
    }

    /// `ALLOCATE_ARRAY_FILLED dims kind`.
    pub fn allocate_filled(dims: u64, kind: ValueKind) -> Self {
        Self {
            opcode: Opcode::AllocateArrayFilled,
            operand: Operand::Fill { dims, kind },
        }
    }

    /// Encoded size in bytes.
    pub fn len(&self) -> usize {
        self.opcode.encoded_len()
    }

    /// Always false: every instruction has at least its opcode byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The word operand, if this instruction has one.
    pub fn word(&self) -> Option<u64> {
        match self.operand {
            Operand::Word(w) => Some(w),
            _ => None,
        }
    }

    /// Append the encoded bytes to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.opcode as u8);
        match self.opcode.operand_layout() {
            OperandLayout::None => {}
            OperandLayout::Signed(width) | OperandLayout::Unsigned(width) => {
                out.extend_from_slice(&self.operand_bits().to_le_bytes()[..width]);
            }
            OperandLayout::Float(4) => {
                let f = match self.operand {
                    Operand::Float(f) => f as f32,
                    _ => 0.0,
                };
                out.extend_from_slice(&f.to_le_bytes());
            }
            OperandLayout::Float(_) => {
                out.extend_from_slice(&self.operand_bits().to_le_bytes());
            }
            OperandLayout::Word => {
                out.extend_from_slice(&self.operand_bits().to_le_bytes());
            }
            OperandLayout::TwoWords => {
                let (id, depth) = match self.operand {
                    Operand::Element { id, depth } => (id, depth),
                    _ => (0, 0),
                };
                out.extend_from_slice(&id.to_le_bytes());
                out.extend_from_slice(&depth.to_le_bytes());
            }
            OperandLayout::WordAndKind => {
                let (dims, kind) = match self.operand {
                    Operand::Fill { dims, kind } => (dims, kind),
                    _ => (0, ValueKind::Int),
                };
                out.extend_from_slice(&dims.to_le_bytes());
                out.push(kind as u8);
            }
        }
    }

    /// Encode to a fresh byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        self.encode_into(&mut out);
        out
    }

    /// Decode the instruction that starts at byte offset `at` of `bytes`.
    pub fn decode(bytes: &[u8], at: usize) -> Result<Self, DecodeError> {
        let byte = *bytes.get(at).ok_or(DecodeError::OutOfRange {
            at,
            len: bytes.len(),
        })?;
        let opcode = Opcode::from_byte(byte, at)?;
        let layout = opcode.operand_layout();

        let start = at + 1;
        let available = bytes.len() - start;
        if available < layout.len() {
            return Err(DecodeError::TruncatedOperand {
                at,
                mnemonic: opcode.mnemonic(),
                needed: layout.len(),
                available,
            });
        }
        let data = &bytes[start..start + layout.len()];

        let operand = match layout {
            OperandLayout::None => Operand::None,
            OperandLayout::Signed(_) => Operand::Int(read_signed(data)),
            OperandLayout::Unsigned(_) => Operand::UInt(read_word(data)),
            OperandLayout::Float(4) => {
                let raw = [data[0], data[1], data[2], data[3]];
                Operand::Float(f32::from_le_bytes(raw) as f64)
            }
            OperandLayout::Float(_) => Operand::Float(f64::from_bits(read_word(data))),
            OperandLayout::Word => Operand::Word(read_word(data)),
            OperandLayout::TwoWords => Operand::Element {
                id: read_word(&data[..WORD]),
                depth: read_word(&data[WORD..]),
            },
            OperandLayout::WordAndKind => Operand::Fill {
                dims: read_word(&data[..WORD]),
                kind: ValueKind::from_byte(data[WORD], start + WORD)?,
            },
        };

        Ok(Self { opcode, operand })
    }

    fn operand_bits(&self) -> u64 {
        match self.operand {
            Operand::Int(i) => i as u64,
            Operand::UInt(u) | Operand::Word(u) => u,
            Operand::Float(f) => f.to_bits(),
            Operand::None | Operand::Element { .. } | Operand::Fill { .. } => 0,
        }
    }
}

/// Zero-extend up to 8 little-endian bytes.
fn read_word(data: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf[..data.len()].copy_from_slice(data);
    u64::from_le_bytes(buf)
}

/// Sign-extend up to 8 little-endian bytes.
fn read_signed(data: &[u8]) -> i64 {
    let negative = data.last().is_some_and(|b| b & 0x80 != 0);
    let mut buf = [if negative { 0xFF } else { 0x00 }; 8];
    buf[..data.len()].copy_from_slice(data);
    i64::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(instr: Instruction) -> Instruction {
        let bytes = instr.encode();
        assert_eq!(bytes.len(), instr.len());
        Instruction::decode(&bytes, 0).unwrap()
    }

    #[test]
    fn push_int_picks_narrowest_width() {
        assert_eq!(Instruction::push_int(5).opcode, Opcode::PushI8);
        assert_eq!(Instruction::push_int(-128).opcode, Opcode::PushI8);
        assert_eq!(Instruction::push_int(300).opcode, Opcode::PushI16);
        assert_eq!(Instruction::push_int(-70_000).opcode, Opcode::PushI32);
        assert_eq!(Instruction::push_int(i64::MIN).opcode, Opcode::PushI64);
    }

    #[test]
    fn push_uint_picks_narrowest_width() {
        assert_eq!(Instruction::push_uint(255).opcode, Opcode::PushU8);
        assert_eq!(Instruction::push_uint(256).opcode, Opcode::PushU16);
        assert_eq!(Instruction::push_uint(1 << 20).opcode, Opcode::PushU32);
        assert_eq!(Instruction::push_uint(u64::MAX).opcode, Opcode::PushU64);
    }

    #[test]
    fn push_float_narrows_only_when_lossless() {
        assert_eq!(Instruction::push_float(0.5).opcode, Opcode::PushF32);
        assert_eq!(Instruction::push_float(0.1).opcode, Opcode::PushF64);
        assert_eq!(Instruction::push_float(1e300).opcode, Opcode::PushF64);
    }

    #[test]
    fn negative_literals_sign_extend() {
        for v in [-1i64, -13, -128, -129, -32_768, i32::MIN as i64, i64::MIN] {
            assert_eq!(roundtrip(Instruction::push_int(v)).operand, Operand::Int(v));
        }
    }

    #[test]
    fn unsigned_literals_zero_extend() {
        for v in [0u64, 200, 65_535, 0xFFFF_FFFF, u64::MAX] {
            assert_eq!(roundtrip(Instruction::push_uint(v)).operand, Operand::UInt(v));
        }
    }

    #[test]
    fn float_literals_roundtrip() {
        for v in [0.5, 0.1, -2.25, f64::MAX] {
            assert_eq!(roundtrip(Instruction::push_float(v)).operand, Operand::Float(v));
        }
    }

    #[test]
    fn little_endian_word() {
        let bytes = Instruction::load(0x0102).encode();
        assert_eq!(bytes, vec![0x40, 0x02, 0x01, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn element_and_fill_operands_roundtrip() {
        let elem = Instruction::store_index(70, 2);
        assert_eq!(roundtrip(elem), elem);
        let fill = Instruction::allocate_filled(3, ValueKind::Float);
        assert_eq!(roundtrip(fill), fill);
    }

    #[test]
    fn decode_at_offset() {
        let mut bytes = Instruction::push_int(1).encode();
        bytes.extend(Instruction::op(Opcode::Return).encode());
        assert_eq!(
            Instruction::decode(&bytes, 2).unwrap(),
            Instruction::op(Opcode::Return)
        );
    }

    #[test]
    fn decode_rejects_truncated_operand() {
        let bytes = [Opcode::Jump as u8, 0x01, 0x00];
        assert_eq!(
            Instruction::decode(&bytes, 0),
            Err(DecodeError::TruncatedOperand {
                at: 0,
                mnemonic: "JUMP",
                needed: 8,
                available: 2,
            })
        );
    }

    #[test]
    fn decode_rejects_bad_fill_kind() {
        let mut bytes = Instruction::allocate_filled(1, ValueKind::Int).encode();
        let last = bytes.len() - 1;
        bytes[last] = 0x77;
        assert_eq!(
            Instruction::decode(&bytes, 0),
            Err(DecodeError::InvalidValueKind { at: 9, byte: 0x77 })
        );
    }

    #[test]
    fn decode_past_end() {
        assert_eq!(
            Instruction::decode(&[], 0),
            Err(DecodeError::OutOfRange { at: 0, len: 0 })
        );
    }
}
