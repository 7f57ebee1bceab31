//! Built-in functions reachable through `CALL` with a reserved Symbol ID.
//!
//! IDs `0..RESERVED_IDS` belong to the built-in table; IDs from
//! [`RESERVED_IDS`] upward name user variables and functions. Unused IDs
//! in the reserved range are rejected by both the generator and the
//! interpreter.

use crate::SymbolId;

/// First Symbol ID available to user code.
pub const RESERVED_IDS: SymbolId = 64;

/// A native operation with a fixed Symbol ID.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    PrintBool = 0,
    PrintChar = 1,
    PrintI8 = 2,
    PrintI16 = 3,
    PrintI32 = 4,
    PrintI64 = 5,
    PrintU8 = 6,
    PrintU16 = 7,
    PrintU32 = 8,
    PrintU64 = 9,
    PrintFloat = 10,
    PrintStr = 11,
    /// Read one line from input, without its line terminator.
    Input = 12,
    ToBool = 13,
    /// Integer code to char, or a one-character string to its code.
    ToChar = 14,
    ToI8 = 15,
    ToI16 = 16,
    ToI32 = 17,
    ToI64 = 18,
    ToU8 = 19,
    ToU16 = 20,
    ToU32 = 21,
    ToU64 = 22,
    ToFloat = 23,
    /// Textual form of a number or string.
    ToStr = 24,
    /// One-character string from a char code.
    CharToStr = 25,
    /// Length of a string in characters, or of an array.
    Len = 26,
}

/// Every built-in, in ID order.
pub const ALL_BUILTINS: [Builtin; 27] = [
    Builtin::PrintBool,
    Builtin::PrintChar,
    Builtin::PrintI8,
    Builtin::PrintI16,
    Builtin::PrintI32,
    Builtin::PrintI64,
    Builtin::PrintU8,
    Builtin::PrintU16,
    Builtin::PrintU32,
    Builtin::PrintU64,
    Builtin::PrintFloat,
    Builtin::PrintStr,
    Builtin::Input,
    Builtin::ToBool,
    Builtin::ToChar,
    Builtin::ToI8,
    Builtin::ToI16,
    Builtin::ToI32,
    Builtin::ToI64,
    Builtin::ToU8,
    Builtin::ToU16,
    Builtin::ToU32,
    Builtin::ToU64,
    Builtin::ToFloat,
    Builtin::ToStr,
    Builtin::CharToStr,
    Builtin::Len,
];

impl Builtin {
    /// Look up a built-in by Symbol ID.
    pub fn from_id(id: SymbolId) -> Option<Self> {
        let index = usize::try_from(id).ok()?;
        ALL_BUILTINS.get(index).copied()
    }

    /// Returns true if `id` lies in the reserved range.
    pub fn is_reserved(id: SymbolId) -> bool {
        id < RESERVED_IDS
    }

    /// The Symbol ID of this built-in.
    pub fn id(&self) -> SymbolId {
        *self as SymbolId
    }

    /// Source-level name, used in disassembly and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::PrintBool => "print_bool",
            Builtin::PrintChar => "print_char",
            Builtin::PrintI8 => "print_int8",
            Builtin::PrintI16 => "print_int16",
            Builtin::PrintI32 => "print_int32",
            Builtin::PrintI64 => "print_int64",
            Builtin::PrintU8 => "print_uint8",
            Builtin::PrintU16 => "print_uint16",
            Builtin::PrintU32 => "print_uint32",
            Builtin::PrintU64 => "print_uint64",
            Builtin::PrintFloat => "print_float",
            Builtin::PrintStr => "print_str",
            Builtin::Input => "input",
            Builtin::ToBool => "bool",
            Builtin::ToChar => "char",
            Builtin::ToI8 => "int8",
            Builtin::ToI16 => "int16",
            Builtin::ToI32 => "int32",
            Builtin::ToI64 => "int64",
            Builtin::ToU8 => "uint8",
            Builtin::ToU16 => "uint16",
            Builtin::ToU32 => "uint32",
            Builtin::ToU64 => "uint64",
            Builtin::ToFloat => "float",
            Builtin::ToStr => "str",
            Builtin::CharToStr => "char_to_str",
            Builtin::Len => "len",
        }
    }

    /// Number of values popped from the stack.
    pub fn arity(&self) -> usize {
        match self {
            Builtin::Input => 0,
            _ => 1,
        }
    }

    /// Returns true if a value is pushed back.
    pub fn returns_value(&self) -> bool {
        !self.is_print()
    }

    /// Returns true for the print family.
    pub fn is_print(&self) -> bool {
        (*self as u8) <= (Builtin::PrintStr as u8)
    }
}
