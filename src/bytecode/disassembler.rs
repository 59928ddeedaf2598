//! Bytecode disassembler for debugging and golden tests.
//!
//! Output has one line per item. Constants print as `@<index><tag> <value>`
//! with strings quoted; instructions as `<mnemonic>[ <operand>]`.

use crate::bytecode::constants::{self, Constant, MARKER};
use crate::bytecode::instruction::OpCode;
use crate::bytecode::reader::BytecodeReader;
use crate::error::Fault;

/// Disassemble a whole bytecode buffer.
pub fn disassemble(code: &[u8]) -> Result<String, Fault> {
    let mut output = String::new();
    let mut reader = BytecodeReader::new(code);

    while reader.peek_byte() == Some(MARKER) {
        let entry = constants::read_entry(&mut reader)?;
        let line = match entry.constant {
            Constant::Number(n) => format!("@{}{} {}", entry.index, entry.tag as char, n),
            Constant::String(s) => format!("@{}{} \"{}\"", entry.index, entry.tag as char, s),
        };
        output.push_str(&line);
        output.push('\n');
    }

    while !reader.is_eof() {
        disassemble_instruction(&mut reader, &mut output)?;
    }

    Ok(output)
}

/// Disassemble the instruction at the reader's position.
pub fn disassemble_instruction(
    reader: &mut BytecodeReader<'_>,
    output: &mut String,
) -> Result<(), Fault> {
    let opcode = reader.fetch_opcode()?;
    let name = opcode.mnemonic();

    output.push_str(name);
    let operand = match opcode {
        OpCode::PushConstant
        | OpCode::DefineGlobal
        | OpCode::SetGlobal
        | OpCode::GetGlobal
        | OpCode::SetLocal
        | OpCode::GetLocal => Some(reader.read_byte()?.to_string()),

        OpCode::Jmp | OpCode::JmpFalse | OpCode::JmpTrue => Some(reader.read_word()?.to_string()),

        OpCode::JmpSigned => Some(reader.read_signed_word()?.to_string()),

        _ => None,
    };
    if let Some(operand) = operand {
        output.push(' ');
        output.push_str(&operand);
    }
    output.push('\n');

    Ok(())
}
