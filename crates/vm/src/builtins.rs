//! Native behavior of the reserved-ID built-in functions.

use std::io::{BufRead, Write};

use night_common::{Builtin, Value, ValueKind};

use crate::error::RuntimeError;
use crate::execute::{mismatch, to_char};
use crate::machine::{Frame, Interpreter};

impl<'a, R: BufRead, W: Write> Interpreter<'a, R, W> {
    /// Run `builtin` against the caller's operand stack.
    pub(crate) fn call_builtin(
        &mut self,
        builtin: Builtin,
        frame: &mut Frame<'_>,
    ) -> Result<(), RuntimeError> {
        let at = frame.at;

        if builtin == Builtin::Input {
            let line = self.read_line(at)?;
            return frame.push(Value::Str(line));
        }

        let arg = frame.pop()?;
        let name = builtin.name();

        let result = match builtin {
            Builtin::PrintBool => {
                let truth = arg.truthy().ok_or_else(|| mismatch(at, name, &arg))?;
                self.print(at, if truth { "true" } else { "false" })?;
                None
            }
            Builtin::PrintChar => {
                let c = to_char(&arg, at)?;
                self.print(at, c.encode_utf8(&mut [0; 4]))?;
                None
            }
            Builtin::PrintI8 => self.print_signed(at, name, &arg, 8)?,
            Builtin::PrintI16 => self.print_signed(at, name, &arg, 16)?,
            Builtin::PrintI32 => self.print_signed(at, name, &arg, 32)?,
            Builtin::PrintI64 => self.print_signed(at, name, &arg, 64)?,
            Builtin::PrintU8 => self.print_unsigned(at, name, &arg, 8)?,
            Builtin::PrintU16 => self.print_unsigned(at, name, &arg, 16)?,
            Builtin::PrintU32 => self.print_unsigned(at, name, &arg, 32)?,
            Builtin::PrintU64 => self.print_unsigned(at, name, &arg, 64)?,
            Builtin::PrintFloat => match arg {
                Value::Float(x) => {
                    self.print(at, &x.to_string())?;
                    None
                }
                other => return Err(mismatch(at, name, &other)),
            },
            Builtin::PrintStr => match arg {
                Value::Str(s) => {
                    self.print(at, &s)?;
                    None
                }
                other => return Err(mismatch(at, name, &other)),
            },

            Builtin::ToBool => Some(to_bool(arg, at)?),
            Builtin::ToChar => Some(to_char_code(arg, at)?),
            Builtin::ToI8 => Some(Value::Int(to_signed(arg, 8, name, at)?)),
            Builtin::ToI16 => Some(Value::Int(to_signed(arg, 16, name, at)?)),
            Builtin::ToI32 => Some(Value::Int(to_signed(arg, 32, name, at)?)),
            Builtin::ToI64 => Some(Value::Int(to_signed(arg, 64, name, at)?)),
            Builtin::ToU8 => Some(Value::UInt(to_unsigned(arg, 8, name, at)?)),
            Builtin::ToU16 => Some(Value::UInt(to_unsigned(arg, 16, name, at)?)),
            Builtin::ToU32 => Some(Value::UInt(to_unsigned(arg, 32, name, at)?)),
            Builtin::ToU64 => Some(Value::UInt(to_unsigned(arg, 64, name, at)?)),
            Builtin::ToFloat => Some(Value::Float(to_float(arg, at)?)),
            Builtin::ToStr => Some(Value::Str(to_text(arg, at)?)),
            Builtin::CharToStr => Some(Value::Str(to_char(&arg, at)?.to_string())),
            Builtin::Len => {
                let len = arg.len().ok_or_else(|| mismatch(at, name, &arg))?;
                Some(Value::Int(len as i64))
            }
            Builtin::Input => None,
        };

        match result {
            Some(value) => frame.push(value),
            None => Ok(()),
        }
    }

    /// Write `text` and flush so output interleaves correctly with input.
    fn print(&mut self, at: usize, text: &str) -> Result<(), RuntimeError> {
        self.output
            .write_all(text.as_bytes())
            .and_then(|()| self.output.flush())
            .map_err(|e| RuntimeError::Io {
                at,
                message: e.to_string(),
            })
    }

    fn print_signed(
        &mut self,
        at: usize,
        name: &'static str,
        arg: &Value,
        bits: u32,
    ) -> Result<Option<Value>, RuntimeError> {
        let raw = match arg {
            Value::Int(i) => *i,
            Value::UInt(u) => *u as i64,
            other => return Err(mismatch(at, name, other)),
        };
        self.print(at, &wrap_signed(raw, bits).to_string())?;
        Ok(None)
    }

    fn print_unsigned(
        &mut self,
        at: usize,
        name: &'static str,
        arg: &Value,
        bits: u32,
    ) -> Result<Option<Value>, RuntimeError> {
        let raw = match arg {
            Value::Int(i) => *i as u64,
            Value::UInt(u) => *u,
            other => return Err(mismatch(at, name, other)),
        };
        self.print(at, &wrap_unsigned(raw, bits).to_string())?;
        Ok(None)
    }

    /// Read one line without its terminator. End of input yields "".
    fn read_line(&mut self, at: usize) -> Result<String, RuntimeError> {
        let mut line = String::new();
        self.input
            .read_line(&mut line)
            .map_err(|e| RuntimeError::Io {
                at,
                message: e.to_string(),
            })?;
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(line)
    }
}

/// Truncate to a `bits`-wide two's complement integer.
fn wrap_signed(value: i64, bits: u32) -> i64 {
    let shift = 64 - bits;
    (value << shift) >> shift
}

/// Truncate to a `bits`-wide unsigned integer.
fn wrap_unsigned(value: u64, bits: u32) -> u64 {
    let shift = 64 - bits;
    (value << shift) >> shift
}

fn invalid(value: &Value, target: &'static str, at: usize) -> RuntimeError {
    RuntimeError::InvalidConversion {
        at,
        value: value.to_string(),
        target,
    }
}

fn to_bool(arg: Value, at: usize) -> Result<Value, RuntimeError> {
    if let Some(truth) = arg.truthy() {
        return Ok(Value::from(truth));
    }
    match &arg {
        Value::Str(s) if s == "true" => Ok(Value::from(true)),
        Value::Str(s) if s == "false" => Ok(Value::from(false)),
        Value::Str(_) => Err(invalid(&arg, "bool", at)),
        other => Err(mismatch(at, "bool", other)),
    }
}

/// Char from an integer code or from a one-character string.
fn to_char_code(arg: Value, at: usize) -> Result<Value, RuntimeError> {
    match &arg {
        Value::Int(_) | Value::UInt(_) => Ok(Value::Int(to_char(&arg, at)? as i64)),
        Value::Str(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Int(c as i64)),
                _ => Err(invalid(&arg, "char", at)),
            }
        }
        other => Err(mismatch(at, "char", other)),
    }
}

fn to_signed(arg: Value, bits: u32, target: &'static str, at: usize) -> Result<i64, RuntimeError> {
    let raw = match &arg {
        Value::Int(i) => *i,
        Value::UInt(u) => *u as i64,
        Value::Float(x) => *x as i64,
        Value::Str(s) => s.trim().parse::<i64>().map_err(|_| invalid(&arg, target, at))?,
        other => return Err(mismatch(at, target, other)),
    };
    Ok(wrap_signed(raw, bits))
}

fn to_unsigned(arg: Value, bits: u32, target: &'static str, at: usize) -> Result<u64, RuntimeError> {
    let raw = match &arg {
        Value::Int(i) => *i as u64,
        Value::UInt(u) => *u,
        Value::Float(x) => *x as u64,
        Value::Str(s) => s.trim().parse::<u64>().map_err(|_| invalid(&arg, target, at))?,
        other => return Err(mismatch(at, target, other)),
    };
    Ok(wrap_unsigned(raw, bits))
}

fn to_float(arg: Value, at: usize) -> Result<f64, RuntimeError> {
    match &arg {
        Value::Int(i) => Ok(*i as f64),
        Value::UInt(u) => Ok(*u as f64),
        Value::Float(x) => Ok(*x),
        Value::Str(s) => s.trim().parse::<f64>().map_err(|_| invalid(&arg, "float", at)),
        other => Err(mismatch(at, "float", other)),
    }
}

fn to_text(arg: Value, at: usize) -> Result<String, RuntimeError> {
    match arg {
        Value::Str(s) => Ok(s),
        Value::Array(_) => Err(RuntimeError::TypeMismatch {
            at,
            op: "str",
            found: ValueKind::Array,
        }),
        scalar => Ok(scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_to_width() {
        assert_eq!(wrap_signed(300, 8), 44);
        assert_eq!(wrap_signed(-129, 8), 127);
        assert_eq!(wrap_signed(i64::MIN, 64), i64::MIN);
        assert_eq!(wrap_unsigned(256, 8), 0);
        assert_eq!(wrap_unsigned(u64::MAX, 16), 0xFFFF);
    }

    #[test]
    fn string_conversions() {
        assert_eq!(to_signed(Value::from(" 42 "), 64, "int64", 0), Ok(42));
        assert_eq!(to_unsigned(Value::from("7"), 8, "uint8", 0), Ok(7));
        assert_eq!(to_float(Value::from("2.5"), 0), Ok(2.5));
        assert_eq!(
            to_signed(Value::from("abc"), 32, "int32", 9),
            Err(RuntimeError::InvalidConversion {
                at: 9,
                value: "abc".into(),
                target: "int32",
            })
        );
    }

    #[test]
    fn char_conversions() {
        assert_eq!(to_char_code(Value::from("A"), 0), Ok(Value::Int(65)));
        assert!(to_char_code(Value::from("AB"), 0).is_err());
        assert_eq!(
            to_char_code(Value::Int(-1), 4),
            Err(RuntimeError::InvalidChar { at: 4, code: -1 })
        );
    }

    #[test]
    fn bool_conversions() {
        assert_eq!(to_bool(Value::Float(0.0), 0), Ok(Value::Int(0)));
        assert_eq!(to_bool(Value::UInt(9), 0), Ok(Value::Int(1)));
        assert_eq!(to_bool(Value::from("true"), 0), Ok(Value::Int(1)));
        assert!(to_bool(Value::from("yes"), 0).is_err());
    }

    #[test]
    fn text_of_scalars() {
        assert_eq!(to_text(Value::Int(-3), 0), Ok("-3".to_string()));
        assert_eq!(to_text(Value::Float(1.5), 0), Ok("1.5".to_string()));
        assert!(to_text(Value::Array(vec![]), 0).is_err());
    }
}
