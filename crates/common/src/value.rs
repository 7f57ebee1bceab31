//! Runtime value representation for the Night interpreter.
//!
//! A [`Value`] exclusively owns its string or array payload. `clone` is a
//! deep copy, assignment drops whatever the slot held before, and nothing
//! is shared between two values.

use std::fmt;

use crate::kind::ValueKind;

/// Runtime value representation.
///
/// Bools and chars have no variant of their own: the generator emits them
/// as signed integers (0/1 and the character code).
#[derive(Debug, Clone)]
pub enum Value {
    /// Signed 64-bit integer.
    Int(i64),
    /// Unsigned 64-bit integer.
    UInt(u64),
    /// IEEE 754 64-bit float.
    Float(f64),
    /// Owned string.
    Str(String),
    /// Owned array. Nested arrays represent extra dimensions.
    Array(Vec<Value>),
}

// Floats compare bitwise so that Value can implement Eq. Arithmetic
// comparisons in the interpreter use IEEE semantics instead.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Value {
    /// Returns the kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::UInt(_) => ValueKind::UInt,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Array(_) => ValueKind::Array,
        }
    }

    /// The zero value of a kind: `0`, `0.0`, `""` or `[]`.
    pub fn zero(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Int => Value::Int(0),
            ValueKind::UInt => Value::UInt(0),
            ValueKind::Float => Value::Float(0.0),
            ValueKind::Str => Value::Str(String::new()),
            ValueKind::Array => Value::Array(Vec::new()),
        }
    }

    /// Build a nested array of the given shape with `fill` zeros at the leaves.
    ///
    /// An empty shape yields the leaf itself.
    pub fn filled(shape: &[usize], fill: ValueKind) -> Self {
        match shape.split_first() {
            None => Value::zero(fill),
            Some((&len, rest)) => {
                Value::Array((0..len).map(|_| Value::filled(rest, fill)).collect())
            }
        }
    }

    /// Truthiness of a scalar. Strings and arrays have none.
    pub fn truthy(&self) -> Option<bool> {
        match self {
            Value::Int(i) => Some(*i != 0),
            Value::UInt(u) => Some(*u != 0),
            Value::Float(f) => Some(*f != 0.0),
            Value::Str(_) | Value::Array(_) => None,
        }
    }

    /// Length of a string (in characters) or an array.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::Array(a) => Some(a.len()),
            _ => None,
        }
    }

    /// Returns true for an empty string or array.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Int(b as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::UInt(u)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::UInt(u) => write!(f, "{u}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}
