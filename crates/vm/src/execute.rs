//! Main execution loop and opcode dispatch for the Night interpreter.

use std::io::{BufRead, Write};

use night_common::{Builtin, Bytecode, Instruction, Opcode, Operand, SymbolId, Value};
use tracing::{debug, trace};

use crate::error::RuntimeError;
use crate::machine::{Frame, Interpreter};
use crate::scope::{Scope, Scopes};

/// What the frame loop does after one instruction.
#[derive(Debug)]
pub(crate) enum Step {
    Next,
    /// Enter the user function with this ID.
    Call(SymbolId),
    /// Leave the current frame, optionally carrying a value.
    Return(Option<Value>),
}

impl<'a, R: BufRead, W: Write> Interpreter<'a, R, W> {
    /// Run `code` as the top-level stream until it ends or returns.
    ///
    /// User calls push a [`Frame`] (and a local [`Scope`]) onto explicit
    /// stacks instead of recursing, so call depth is bounded only by
    /// [`Limits::max_call_depth`](crate::Limits).
    pub(crate) fn execute(
        &mut self,
        code: &Bytecode,
        globals: &mut Scope,
    ) -> Result<Option<Value>, RuntimeError> {
        let functions = self.functions;
        let max_stack_depth = self.limits.max_stack_depth;
        let mut frames = vec![Frame::new(code, max_stack_depth)];
        let mut locals: Vec<Scope> = Vec::new();

        loop {
            let depth = locals.len();
            let Some(frame) = frames.last_mut() else {
                return Ok(None);
            };

            let step = if frame.ip < frame.code.len() {
                let mut scopes = match locals.last_mut() {
                    Some(local) => Scopes::with_local(globals, local),
                    None => Scopes::global(globals),
                };
                self.step(frame, &mut scopes)?
            } else {
                Step::Return(None)
            };

            match step {
                Step::Next => {}
                Step::Call(id) => {
                    let at = frame.at;
                    let function = functions
                        .get(&id)
                        .ok_or(RuntimeError::UnknownFunction { at, id })?;
                    if depth >= self.limits.max_call_depth {
                        return Err(RuntimeError::CallDepthExceeded {
                            at,
                            limit: self.limits.max_call_depth,
                        });
                    }

                    // Arguments were pushed left to right, so the last parameter is on top.
                    let mut scope = Scope::new();
                    for &param in function.params.iter().rev() {
                        let value = frame.pop()?;
                        scope.set(param, value);
                    }

                    debug!(at, function = id, args = function.params.len(), depth, "call");
                    locals.push(scope);
                    frames.push(Frame::new(&function.code, max_stack_depth));
                }
                Step::Return(value) => {
                    debug!(depth, returns = value.is_some(), "return");
                    frames.pop();
                    if depth == 0 {
                        return Ok(value);
                    }
                    locals.pop();
                    if let (Some(caller), Some(value)) = (frames.last_mut(), value) {
                        caller.push(value)?;
                    }
                }
            }
        }
    }

    /// Decode and dispatch the instruction at the frame's instruction pointer.
    ///
    /// The instruction pointer is moved past the instruction before it is
    /// dispatched, so jumps simply overwrite it. A backward jump to offset 0
    /// resumes at the first instruction.
    fn step(
        &mut self,
        frame: &mut Frame<'_>,
        scopes: &mut Scopes<'_>,
    ) -> Result<Step, RuntimeError> {
        let at = frame.ip;
        let instr = frame.code.decode_at(at)?;
        frame.at = at;
        frame.ip = at + instr.len();
        trace!(at, op = instr.opcode.mnemonic(), stack = frame.stack.len(), "dispatch");
        match instr.opcode {
            // Literals
            Opcode::PushI8
            | Opcode::PushI16
            | Opcode::PushI32
            | Opcode::PushI64
            | Opcode::PushU8
            | Opcode::PushU16
            | Opcode::PushU32
            | Opcode::PushU64
            | Opcode::PushF32
            | Opcode::PushF64 => {
                let value = literal(&instr, at)?;
                frame.push(value)?;
            }

            // Unary
            Opcode::NegI => exec_neg_i(frame)?,
            Opcode::NegF => {
                let x = pop_float(frame, "NEG_F")?;
                frame.push(Value::Float(-x))?;
            }
            Opcode::NotI => {
                let x = pop_int(frame, "NOT_I")?;
                frame.push(Value::from(x == 0))?;
            }
            Opcode::NotF => {
                let x = pop_float(frame, "NOT_F")?;
                frame.push(Value::from(x == 0.0))?;
            }

            // Integer arithmetic
            Opcode::AddI => exec_int_arith(frame, "ADD_I", i64::wrapping_add, u64::wrapping_add)?,
            Opcode::SubI => exec_int_arith(frame, "SUB_I", i64::wrapping_sub, u64::wrapping_sub)?,
            Opcode::MulI => exec_int_arith(frame, "MUL_I", i64::wrapping_mul, u64::wrapping_mul)?,
            Opcode::DivI => exec_int_div(frame, "DIV_I", i64::wrapping_div, u64::wrapping_div)?,
            Opcode::Mod => exec_int_div(frame, "MOD", i64::wrapping_rem, u64::wrapping_rem)?,

            // Float arithmetic
            Opcode::AddF => exec_float_arith(frame, "ADD_F", |a, b| a + b)?,
            Opcode::SubF => exec_float_arith(frame, "SUB_F", |a, b| a - b)?,
            Opcode::MulF => exec_float_arith(frame, "MUL_F", |a, b| a * b)?,
            Opcode::DivF => {
                let b = pop_float(frame, "DIV_F")?;
                let a = pop_float(frame, "DIV_F")?;
                if b == 0.0 {
                    return Err(RuntimeError::DivisionByZero { at });
                }
                frame.push(Value::Float(a / b))?;
            }

            // Strings
            Opcode::AddS => {
                let b = pop_str(frame, "ADD_S")?;
                let mut a = pop_str(frame, "ADD_S")?;
                a.push_str(&b);
                frame.push(Value::Str(a))?;
            }

            // Comparison
            Opcode::LtI => exec_int_cmp(frame, "LT_I", |a, b| a < b)?,
            Opcode::LeI => exec_int_cmp(frame, "LE_I", |a, b| a <= b)?,
            Opcode::GtI => exec_int_cmp(frame, "GT_I", |a, b| a > b)?,
            Opcode::GeI => exec_int_cmp(frame, "GE_I", |a, b| a >= b)?,
            Opcode::EqI => exec_int_cmp(frame, "EQ_I", |a, b| a == b)?,
            Opcode::NeI => exec_int_cmp(frame, "NE_I", |a, b| a != b)?,
            Opcode::LtF => exec_float_cmp(frame, "LT_F", |a, b| a < b)?,
            Opcode::LeF => exec_float_cmp(frame, "LE_F", |a, b| a <= b)?,
            Opcode::GtF => exec_float_cmp(frame, "GT_F", |a, b| a > b)?,
            Opcode::GeF => exec_float_cmp(frame, "GE_F", |a, b| a >= b)?,
            Opcode::EqF => exec_float_cmp(frame, "EQ_F", |a, b| a == b)?,
            Opcode::NeF => exec_float_cmp(frame, "NE_F", |a, b| a != b)?,
            Opcode::LtS => exec_str_cmp(frame, "LT_S", |a, b| a < b)?,
            Opcode::LeS => exec_str_cmp(frame, "LE_S", |a, b| a <= b)?,
            Opcode::GtS => exec_str_cmp(frame, "GT_S", |a, b| a > b)?,
            Opcode::GeS => exec_str_cmp(frame, "GE_S", |a, b| a >= b)?,
            Opcode::EqS => exec_str_cmp(frame, "EQ_S", |a, b| a == b)?,
            Opcode::NeS => exec_str_cmp(frame, "NE_S", |a, b| a != b)?,

            // Logical
            Opcode::And => exec_logic(frame, "AND", |a, b| a && b)?,
            Opcode::Or => exec_logic(frame, "OR", |a, b| a || b)?,

            // Conversions
            Opcode::IntToFloat => {
                let value = frame.pop()?;
                let f = match value {
                    Value::Int(i) => i as f64,
                    Value::UInt(u) => u as f64,
                    other => return Err(mismatch(at, "INT_TO_FLOAT", &other)),
                };
                frame.push(Value::Float(f))?;
            }
            Opcode::FloatToInt => {
                let x = pop_float(frame, "FLOAT_TO_INT")?;
                frame.push(Value::Int(x as i64))?;
            }
            Opcode::FloatToBool => {
                let x = pop_float(frame, "FLOAT_TO_BOOL")?;
                frame.push(Value::from(x != 0.0))?;
            }

            // Memory
            Opcode::Load => {
                let id = word(&instr, at)?;
                let value = scopes
                    .load(id)
                    .cloned()
                    .ok_or(RuntimeError::UndefinedVariable { at, id })?;
                frame.push(value)?;
            }
            Opcode::Store => {
                let id = word(&instr, at)?;
                let value = frame.pop()?;
                scopes.store(id, value);
            }
            Opcode::LoadElem => {
                let (id, depth) = element(&instr, at)?;
                let indices = pop_indices(frame, depth)?;
                let base = scopes
                    .load(id)
                    .ok_or(RuntimeError::UndefinedVariable { at, id })?;
                let value = read_element(base, &indices, at)?;
                frame.push(value)?;
            }
            Opcode::StoreIndex => {
                let (id, depth) = element(&instr, at)?;
                let value = frame.pop()?;
                let indices = pop_indices(frame, depth)?;
                let base = scopes
                    .load_mut(id)
                    .ok_or(RuntimeError::UndefinedVariable { at, id })?;
                write_element(base, &indices, value, at)?;
            }
            Opcode::Index => {
                let index = frame.pop()?;
                let container = frame.pop()?;
                let value = read_element(&container, &[index], at)?;
                frame.push(value)?;
            }

            // Allocation
            Opcode::AllocateString => {
                let count = word(&instr, at)?;
                let codes = frame.pop_n(count)?;
                let s = codes
                    .iter()
                    .map(|code| to_char(code, at))
                    .collect::<Result<String, _>>()?;
                frame.push(Value::Str(s))?;
            }
            Opcode::AllocateArray => {
                let count = word(&instr, at)?;
                let items = frame.pop_n(count)?;
                frame.push(Value::Array(items))?;
            }
            Opcode::AllocateArrayFilled => {
                let (dims, kind) = match instr.operand {
                    Operand::Fill { dims, kind } => (dims, kind),
                    _ => return Err(bad_operand(at)),
                };
                let sizes = frame.pop_n(dims)?;
                let shape = sizes
                    .iter()
                    .map(|size| to_size(size, at))
                    .collect::<Result<Vec<_>, _>>()?;
                check_fill(&shape, self.limits.max_array_len, at)?;
                frame.push(Value::filled(&shape, kind))?;
            }

            // Control
            Opcode::Jump => {
                let offset = word(&instr, at)?;
                frame.ip = forward(frame.ip, offset, frame.code.len(), at)?;
            }
            Opcode::JumpBackward => {
                let offset = usize::try_from(word(&instr, at)?)
                    .map_err(|_| RuntimeError::JumpOutOfBounds { at })?;
                frame.ip = frame
                    .ip
                    .checked_sub(offset)
                    .ok_or(RuntimeError::JumpOutOfBounds { at })?;
            }
            Opcode::JumpIfFalse => {
                let offset = word(&instr, at)?;
                let cond = frame.pop()?;
                let truth = cond
                    .truthy()
                    .ok_or_else(|| mismatch(at, "JUMP_IF_FALSE", &cond))?;
                if !truth {
                    frame.ip = forward(frame.ip, offset, frame.code.len(), at)?;
                }
            }
            Opcode::Call => {
                let id = word(&instr, at)?;
                return self.exec_call(frame, id);
            }
            Opcode::Return => return Ok(Step::Return(frame.stack.pop())),
            Opcode::Pop => {
                frame.pop()?;
            }
        }

        Ok(Step::Next)
    }

    /// Built-ins run in place; user IDs are handed back to the frame loop.
    fn exec_call(&mut self, frame: &mut Frame<'_>, id: SymbolId) -> Result<Step, RuntimeError> {
        if !Builtin::is_reserved(id) {
            return Ok(Step::Call(id));
        }
        let at = frame.at;
        let builtin = Builtin::from_id(id).ok_or(RuntimeError::UnknownFunction { at, id })?;
        trace!(at, builtin = builtin.name(), "builtin call");
        self.call_builtin(builtin, frame)?;
        Ok(Step::Next)
    }
}

// ---- Operand helpers ----

fn literal(instr: &Instruction, at: usize) -> Result<Value, RuntimeError> {
    match instr.operand {
        Operand::Int(i) => Ok(Value::Int(i)),
        Operand::UInt(u) => Ok(Value::UInt(u)),
        Operand::Float(f) => Ok(Value::Float(f)),
        _ => Err(bad_operand(at)),
    }
}

fn word(instr: &Instruction, at: usize) -> Result<u64, RuntimeError> {
    instr.word().ok_or_else(|| bad_operand(at))
}

fn element(instr: &Instruction, at: usize) -> Result<(SymbolId, u64), RuntimeError> {
    match instr.operand {
        Operand::Element { id, depth } => Ok((id, depth)),
        _ => Err(bad_operand(at)),
    }
}

fn bad_operand(at: usize) -> RuntimeError {
    RuntimeError::InvalidOperand { at }
}

fn forward(next: usize, offset: u64, len: usize, at: usize) -> Result<usize, RuntimeError> {
    usize::try_from(offset)
        .ok()
        .and_then(|offset| next.checked_add(offset))
        .filter(|&target| target <= len)
        .ok_or(RuntimeError::JumpOutOfBounds { at })
}

pub(crate) fn mismatch(at: usize, op: &'static str, found: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        at,
        op,
        found: found.kind(),
    }
}

// ---- Typed pops ----

fn pop_float(frame: &mut Frame<'_>, op: &'static str) -> Result<f64, RuntimeError> {
    match frame.pop()? {
        Value::Float(x) => Ok(x),
        other => Err(mismatch(frame.at, op, &other)),
    }
}

/// Pop an integer of either signedness, widened to i128.
fn pop_int(frame: &mut Frame<'_>, op: &'static str) -> Result<i128, RuntimeError> {
    match frame.pop()? {
        Value::Int(i) => Ok(i as i128),
        Value::UInt(u) => Ok(u as i128),
        other => Err(mismatch(frame.at, op, &other)),
    }
}

fn pop_str(frame: &mut Frame<'_>, op: &'static str) -> Result<String, RuntimeError> {
    match frame.pop()? {
        Value::Str(s) => Ok(s),
        other => Err(mismatch(frame.at, op, &other)),
    }
}

/// Pop `depth` subscripts. The outermost index is on top of the stack.
fn pop_indices(frame: &mut Frame<'_>, depth: u64) -> Result<Vec<Value>, RuntimeError> {
    let mut indices = frame.pop_n(depth)?;
    indices.reverse();
    Ok(indices)
}

// ---- Arithmetic ----

fn exec_neg_i(frame: &mut Frame<'_>) -> Result<(), RuntimeError> {
    let result = match frame.pop()? {
        Value::Int(x) => Value::Int(x.wrapping_neg()),
        Value::UInt(x) => Value::Int((x as i64).wrapping_neg()),
        other => return Err(mismatch(frame.at, "NEG_I", &other)),
    };
    frame.push(result)
}

/// Binary integer arithmetic. Two unsigned operands stay unsigned; any
/// signed operand makes the result signed.
fn exec_int_arith(
    frame: &mut Frame<'_>,
    op: &'static str,
    i64_op: fn(i64, i64) -> i64,
    u64_op: fn(u64, u64) -> u64,
) -> Result<(), RuntimeError> {
    let b = frame.pop()?;
    let a = frame.pop()?;

    let result = match (a, b) {
        (Value::UInt(x), Value::UInt(y)) => Value::UInt(u64_op(x, y)),
        (Value::Int(x), Value::Int(y)) => Value::Int(i64_op(x, y)),
        (Value::Int(x), Value::UInt(y)) => Value::Int(i64_op(x, y as i64)),
        (Value::UInt(x), Value::Int(y)) => Value::Int(i64_op(x as i64, y)),
        (Value::Int(_) | Value::UInt(_), other) | (other, _) => {
            return Err(mismatch(frame.at, op, &other))
        }
    };

    frame.push(result)
}

/// Integer division or remainder with a zero-divisor check.
fn exec_int_div(
    frame: &mut Frame<'_>,
    op: &'static str,
    i64_op: fn(i64, i64) -> i64,
    u64_op: fn(u64, u64) -> u64,
) -> Result<(), RuntimeError> {
    if let Some(Value::Int(0) | Value::UInt(0)) = frame.stack.last() {
        return Err(RuntimeError::DivisionByZero { at: frame.at });
    }
    exec_int_arith(frame, op, i64_op, u64_op)
}

fn exec_float_arith(
    frame: &mut Frame<'_>,
    op: &'static str,
    f: fn(f64, f64) -> f64,
) -> Result<(), RuntimeError> {
    let b = pop_float(frame, op)?;
    let a = pop_float(frame, op)?;
    frame.push(Value::Float(f(a, b)))
}

// ---- Comparison and logic ----

fn exec_int_cmp(
    frame: &mut Frame<'_>,
    op: &'static str,
    cmp: fn(i128, i128) -> bool,
) -> Result<(), RuntimeError> {
    let b = pop_int(frame, op)?;
    let a = pop_int(frame, op)?;
    frame.push(Value::from(cmp(a, b)))
}

fn exec_float_cmp(
    frame: &mut Frame<'_>,
    op: &'static str,
    cmp: fn(f64, f64) -> bool,
) -> Result<(), RuntimeError> {
    let b = pop_float(frame, op)?;
    let a = pop_float(frame, op)?;
    frame.push(Value::from(cmp(a, b)))
}

fn exec_str_cmp(
    frame: &mut Frame<'_>,
    op: &'static str,
    cmp: fn(&str, &str) -> bool,
) -> Result<(), RuntimeError> {
    let b = pop_str(frame, op)?;
    let a = pop_str(frame, op)?;
    frame.push(Value::from(cmp(&a, &b)))
}

fn exec_logic(
    frame: &mut Frame<'_>,
    op: &'static str,
    f: fn(bool, bool) -> bool,
) -> Result<(), RuntimeError> {
    let b = frame.pop()?;
    let a = frame.pop()?;
    let y = b.truthy().ok_or_else(|| mismatch(frame.at, op, &b))?;
    let x = a.truthy().ok_or_else(|| mismatch(frame.at, op, &a))?;
    frame.push(Value::from(f(x, y)))
}

// ---- Element access ----

/// Convert a subscript value to a position, rejecting negatives.
fn to_index(index: &Value, length: usize, at: usize) -> Result<usize, RuntimeError> {
    let raw = match index {
        Value::Int(i) => *i,
        Value::UInt(u) => i64::try_from(*u).unwrap_or(i64::MAX),
        other => return Err(mismatch(at, "INDEX", other)),
    };
    usize::try_from(raw)
        .ok()
        .filter(|&i| i < length)
        .ok_or(RuntimeError::IndexOutOfBounds {
            at,
            index: raw,
            length,
        })
}

fn to_size(size: &Value, at: usize) -> Result<usize, RuntimeError> {
    match size {
        Value::Int(i) => usize::try_from(*i).map_err(|_| RuntimeError::NegativeSize { at, size: *i }),
        Value::UInt(u) => usize::try_from(*u).map_err(|_| RuntimeError::NegativeSize {
            at,
            size: i64::MAX,
        }),
        other => Err(mismatch(at, "ALLOCATE_ARRAY_FILLED", other)),
    }
}

/// Reject shapes whose allocation would create more than `limit` values at
/// any level. Level `n` holds the product of the first `n + 1` sizes.
fn check_fill(shape: &[usize], limit: usize, at: usize) -> Result<(), RuntimeError> {
    let mut count: usize = 1;
    for &len in shape {
        count = count
            .checked_mul(len)
            .filter(|&n| n <= limit)
            .ok_or(RuntimeError::ArrayTooLarge { at, limit })?;
    }
    Ok(())
}

/// Convert an integer character code to a `char`.
pub(crate) fn to_char(code: &Value, at: usize) -> Result<char, RuntimeError> {
    let raw = match code {
        Value::Int(i) => *i,
        Value::UInt(u) => i64::try_from(*u).unwrap_or(i64::MAX),
        other => return Err(mismatch(at, "char", other)),
    };
    u32::try_from(raw)
        .ok()
        .and_then(char::from_u32)
        .ok_or(RuntimeError::InvalidChar { at, code: raw })
}

/// Walk `indices` into `base` and copy out the element they address.
///
/// A string yields the character code at the last index.
fn read_element(base: &Value, indices: &[Value], at: usize) -> Result<Value, RuntimeError> {
    let mut current = base;
    for (n, index) in indices.iter().enumerate() {
        match current {
            Value::Array(items) => {
                let i = to_index(index, items.len(), at)?;
                current = &items[i];
            }
            Value::Str(s) if n + 1 == indices.len() => {
                let length = s.chars().count();
                let i = to_index(index, length, at)?;
                let c = s.chars().nth(i).ok_or(RuntimeError::IndexOutOfBounds {
                    at,
                    index: i as i64,
                    length,
                })?;
                return Ok(Value::Int(c as i64));
            }
            other => return Err(mismatch(at, "INDEX", other)),
        }
    }
    Ok(current.clone())
}

/// Walk `indices` into `base` and overwrite the addressed element.
fn write_element(
    base: &mut Value,
    indices: &[Value],
    value: Value,
    at: usize,
) -> Result<(), RuntimeError> {
    let Some((last, path)) = indices.split_last() else {
        *base = value;
        return Ok(());
    };

    let mut current = base;
    for index in path {
        current = match current {
            Value::Array(items) => {
                let i = to_index(index, items.len(), at)?;
                &mut items[i]
            }
            other => return Err(mismatch(at, "STORE_INDEX", other)),
        };
    }

    match current {
        Value::Array(items) => {
            let i = to_index(last, items.len(), at)?;
            items[i] = value;
        }
        Value::Str(s) => {
            let mut chars: Vec<char> = s.chars().collect();
            let i = to_index(last, chars.len(), at)?;
            chars[i] = to_char(&value, at)?;
            *s = chars.into_iter().collect();
        }
        other => return Err(mismatch(at, "STORE_INDEX", other)),
    }
    Ok(())
}
