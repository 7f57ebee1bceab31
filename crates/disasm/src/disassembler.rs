//! Listing format: one instruction per line, prefixed by its byte offset.
//!
//! ```text
//! 0000  PUSH_I8 5
//! 0002  JUMP_IF_FALSE 9 -> 0020
//! 0011  CALL 5 (print_int64)
//! ```

use night_common::{
    jump_target, Builtin, Bytecode, DecodeError, Instruction, Opcode, Operand, Program,
};

/// List every instruction of `code`.
///
/// Stops at the first undecodable byte and reports it.
pub fn disassemble(code: &Bytecode) -> Result<String, DecodeError> {
    let mut out = String::new();
    for item in code.instructions() {
        let (at, instr) = item?;
        out.push_str(&line(at, &instr));
        out.push('\n');
    }
    Ok(out)
}

/// List the main stream followed by each function in ID order.
pub fn disassemble_program(program: &Program) -> Result<String, DecodeError> {
    let mut out = String::from("main:\n");
    out.push_str(&disassemble(&program.main)?);

    for id in program.function_ids() {
        let Some(function) = program.function(id) else {
            continue;
        };
        let params: Vec<String> = function.params.iter().map(u64::to_string).collect();
        out.push_str(&format!("\nfunction {id} ({}):\n", params.join(", ")));
        out.push_str(&disassemble(&function.code)?);
    }
    Ok(out)
}

/// One listing line, without the newline.
pub fn line(at: usize, instr: &Instruction) -> String {
    let mnemonic = instr.opcode.mnemonic();
    let text = match instr.operand {
        Operand::None => mnemonic.to_string(),
        Operand::Int(i) => format!("{mnemonic} {i}"),
        Operand::UInt(u) => format!("{mnemonic} {u}"),
        Operand::Float(x) => format!("{mnemonic} {x:?}"),
        Operand::Word(w) if instr.opcode.is_jump() => match jump_target(at, instr) {
            Some(target) => format!("{mnemonic} {w} -> {target:04}"),
            None => format!("{mnemonic} {w} -> ?"),
        },
        Operand::Word(w) if instr.opcode == Opcode::Call => {
            match Builtin::from_id(w) {
                Some(builtin) => format!("{mnemonic} {w} ({})", builtin.name()),
                None => format!("{mnemonic} {w}"),
            }
        }
        Operand::Word(w) => format!("{mnemonic} {w}"),
        Operand::Element { id, depth } => format!("{mnemonic} {id} {depth}"),
        Operand::Fill { dims, kind } => format!("{mnemonic} {dims} {kind}"),
    };
    format!("{at:04}  {text}")
}
