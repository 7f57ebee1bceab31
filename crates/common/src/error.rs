//! Decode errors for Night instruction streams.

use thiserror::Error;

/// Errors that occur while decoding a byte stream into instructions.
///
/// Every variant carries the byte offset of the instruction being decoded.
/// A stream produced by the code generator never triggers any of these, so
/// seeing one means the stream was corrupted or hand-built incorrectly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Opcode 0x00 is illegal and always rejected.
    #[error("illegal opcode 0x00 at byte {at}")]
    IllegalOpcode { at: usize },

    /// Opcode byte does not name any instruction.
    #[error("reserved opcode {byte:#04x} at byte {at}")]
    ReservedOpcode { at: usize, byte: u8 },

    /// The stream ends before all operand bytes of an instruction.
    #[error("truncated {mnemonic} at byte {at}: needs {needed} operand bytes, {available} left")]
    TruncatedOperand {
        at: usize,
        mnemonic: &'static str,
        needed: usize,
        available: usize,
    },

    /// Fill-kind operand byte does not name a value kind.
    #[error("invalid value kind {byte:#04x} at byte {at}")]
    InvalidValueKind { at: usize, byte: u8 },

    /// Offset lies past the end of the stream.
    #[error("offset {at} is past the end of the stream (length {len})")]
    OutOfRange { at: usize, len: usize },

    /// A jump lands inside another instruction or outside the stream.
    #[error("jump at byte {at} targets byte {target}, which is not an instruction boundary")]
    MisalignedJump { at: usize, target: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_illegal_opcode() {
        assert_eq!(
            DecodeError::IllegalOpcode { at: 3 }.to_string(),
            "illegal opcode 0x00 at byte 3"
        );
    }

    #[test]
    fn display_reserved_opcode() {
        assert_eq!(
            DecodeError::ReservedOpcode { at: 0, byte: 0x0F }.to_string(),
            "reserved opcode 0x0f at byte 0"
        );
    }

    #[test]
    fn display_truncated_operand() {
        assert_eq!(
            DecodeError::TruncatedOperand {
                at: 4,
                mnemonic: "LOAD",
                needed: 8,
                available: 2,
            }
            .to_string(),
            "truncated LOAD at byte 4: needs 8 operand bytes, 2 left"
        );
    }

    #[test]
    fn display_misaligned_jump() {
        assert_eq!(
            DecodeError::MisalignedJump { at: 10, target: 13 }.to_string(),
            "jump at byte 10 targets byte 13, which is not an instruction boundary"
        );
    }
}
