//! Value kinds: the runtime tag of a [`Value`](crate::Value).
//!
//! A kind is also encoded as the fill operand of `ALLOCATE_ARRAY_FILLED`,
//! telling the interpreter what zero value to put at the leaves.

use crate::error::DecodeError;

/// Identifies which variant of a runtime value is active.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Signed 64-bit integer. Bools and chars are stored this way too.
    Int = 0x01,
    /// Unsigned 64-bit integer.
    UInt = 0x02,
    /// IEEE 754 64-bit float.
    Float = 0x03,
    /// Owned string.
    Str = 0x04,
    /// Owned vector of values.
    Array = 0x05,
}

/// All value kinds, in definition order.
pub const ALL_VALUE_KINDS: [ValueKind; 5] = [
    ValueKind::Int,
    ValueKind::UInt,
    ValueKind::Float,
    ValueKind::Str,
    ValueKind::Array,
];

impl ValueKind {
    /// Decode a fill-kind byte found at byte offset `at`.
    pub fn from_byte(byte: u8, at: usize) -> Result<Self, DecodeError> {
        match byte {
            0x01 => Ok(ValueKind::Int),
            0x02 => Ok(ValueKind::UInt),
            0x03 => Ok(ValueKind::Float),
            0x04 => Ok(ValueKind::Str),
            0x05 => Ok(ValueKind::Array),
            _ => Err(DecodeError::InvalidValueKind { at, byte }),
        }
    }

    /// Returns the lowercase name used in diagnostics and disassembly.
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Int => "int",
            ValueKind::UInt => "uint",
            ValueKind::Float => "float",
            ValueKind::Str => "str",
            ValueKind::Array => "array",
        }
    }

    /// Returns true for the kinds arithmetic opcodes accept.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueKind::Int | ValueKind::UInt | ValueKind::Float)
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_value_kinds() {
        for &kind in &ALL_VALUE_KINDS {
            let byte = kind as u8;
            assert_eq!(ValueKind::from_byte(byte, 0), Ok(kind));
        }
    }

    #[test]
    fn invalid_kind_bytes() {
        for byte in [0x00u8, 0x06, 0x7F, 0xFF] {
            assert_eq!(
                ValueKind::from_byte(byte, 9),
                Err(DecodeError::InvalidValueKind { at: 9, byte })
            );
        }
    }

    #[test]
    fn numeric_kinds() {
        assert!(ValueKind::Int.is_numeric());
        assert!(ValueKind::UInt.is_numeric());
        assert!(ValueKind::Float.is_numeric());
        assert!(!ValueKind::Str.is_numeric());
        assert!(!ValueKind::Array.is_numeric());
    }

    #[test]
    fn display_uses_name() {
        assert_eq!(ValueKind::Str.to_string(), "str");
    }
}
