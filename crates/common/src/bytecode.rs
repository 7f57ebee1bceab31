//! Byte streams of encoded instructions.
//!
//! A [`Bytecode`] is the unit the generator produces and the interpreter
//! consumes: the main program body and every function body are each one
//! stream. Streams have no header; instructions are packed back to back.

use crate::error::DecodeError;
use crate::instruction::Instruction;
use crate::opcode::{Opcode, WORD};

/// An encoded instruction stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bytecode {
    bytes: Vec<u8>,
}

impl Bytecode {
    /// Create an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap raw bytes without validating them.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Build a stream from a sequence of instructions.
    pub fn from_instructions<'a>(instrs: impl IntoIterator<Item = &'a Instruction>) -> Self {
        let mut code = Self::new();
        for instr in instrs {
            code.push(instr);
        }
        code
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the stream and return its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the stream has no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Append one instruction, returning the byte offset it was written at.
    pub fn push(&mut self, instr: &Instruction) -> usize {
        let at = self.bytes.len();
        instr.encode_into(&mut self.bytes);
        at
    }

    /// Append another stream verbatim.
    pub fn append(&mut self, other: &Bytecode) {
        self.bytes.extend_from_slice(&other.bytes);
    }

    /// Overwrite the 8-byte word operand of the instruction at `at`.
    ///
    /// `at` is the offset of the opcode byte; the word starts right after it.
    pub fn patch_word(&mut self, at: usize, word: u64) -> Result<(), DecodeError> {
        let start = at + 1;
        let len = self.bytes.len();
        let slot = self
            .bytes
            .get_mut(start..start + WORD)
            .ok_or(DecodeError::OutOfRange { at, len })?;
        slot.copy_from_slice(&word.to_le_bytes());
        Ok(())
    }

    /// Decode the instruction at byte offset `at`.
    pub fn decode_at(&self, at: usize) -> Result<Instruction, DecodeError> {
        Instruction::decode(&self.bytes, at)
    }

    /// Iterate over `(offset, instruction)` pairs from the start.
    ///
    /// Iteration stops after the first decode error, which is yielded.
    pub fn instructions(&self) -> Instructions<'_> {
        Instructions {
            bytes: &self.bytes,
            at: 0,
            failed: false,
        }
    }

    /// Offsets of every instruction boundary, including the end of stream.
    pub fn boundaries(&self) -> Result<Vec<usize>, DecodeError> {
        let mut out = Vec::new();
        for item in self.instructions() {
            let (at, _) = item?;
            out.push(at);
        }
        out.push(self.bytes.len());
        Ok(out)
    }

    /// Verify that every jump lands on an instruction boundary or the end.
    pub fn check_jump_targets(&self) -> Result<(), DecodeError> {
        let boundaries = self.boundaries()?;
        for item in self.instructions() {
            let (at, instr) = item?;
            if !instr.opcode.is_jump() {
                continue;
            }
            match jump_target(at, &instr) {
                Some(target) if boundaries.binary_search(&target).is_ok() => {}
                Some(target) => return Err(DecodeError::MisalignedJump { at, target }),
                None => {
                    return Err(DecodeError::MisalignedJump {
                        at,
                        target: usize::MAX,
                    })
                }
            }
        }
        Ok(())
    }
}

/// Absolute target of the jump instruction encoded at `at`.
///
/// Offsets count from the first byte after the jump. Returns `None` for
/// non-jumps and for backward offsets that reach before the stream start.
pub fn jump_target(at: usize, instr: &Instruction) -> Option<usize> {
    let next = at + instr.len();
    let offset = usize::try_from(instr.word()?).ok()?;
    match instr.opcode {
        Opcode::Jump | Opcode::JumpIfFalse => next.checked_add(offset),
        Opcode::JumpBackward => next.checked_sub(offset),
        _ => None,
    }
}

/// Iterator over the instructions of a [`Bytecode`].
pub struct Instructions<'a> {
    bytes: &'a [u8],
    at: usize,
    failed: bool,
}

impl Iterator for Instructions<'_> {
    type Item = Result<(usize, Instruction), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.at >= self.bytes.len() {
            return None;
        }
        match Instruction::decode(self.bytes, self.at) {
            Ok(instr) => {
                let at = self.at;
                self.at += instr.len();
                Some(Ok((at, instr)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
