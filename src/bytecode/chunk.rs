//! Instruction stream writer and the source-location side table.

use crate::bytecode::instruction::OpCode;
use crate::error::CompileError;
use crate::span::Span;

/// Maps instruction start offsets to the span of the node that emitted them.
/// Offsets are kept in ascending order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebugInfo {
    entries: Vec<(usize, Span)>,
}

impl DebugInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, offset: usize, span: Span) {
        self.entries.push((offset, span));
    }

    /// Span of the instruction starting at `offset`.
    pub fn span_at(&self, offset: usize) -> Option<Span> {
        self.entries
            .binary_search_by_key(&offset, |(o, _)| *o)
            .ok()
            .map(|i| self.entries[i].1)
    }

    /// Shift every offset by `delta`, used once the constant section is
    /// placed in front of the code.
    pub fn shifted(mut self, delta: usize) -> Self {
        for (offset, _) in &mut self.entries {
            *offset += delta;
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A chunk of bytecode instructions under construction.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    /// The bytecode instructions.
    pub code: Vec<u8>,
    /// Source spans for error reporting.
    pub debug: DebugInfo,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an opcode with no operand.
    pub fn write_op(&mut self, op: OpCode, span: Span) {
        self.debug.record(self.code.len(), span);
        self.code.push(op as u8);
    }

    /// Write an opcode followed by a one-byte operand.
    pub fn write_op_u8(&mut self, op: OpCode, operand: u8, span: Span) {
        self.write_op(op, span);
        self.code.push(operand);
    }

    /// Write an opcode followed by a 16-bit operand (little-endian).
    pub fn write_op_u16(&mut self, op: OpCode, word: u16, span: Span) {
        self.write_op(op, span);
        self.code.extend_from_slice(&word.to_le_bytes());
    }

    /// Write a forward jump with a placeholder operand and return the offset
    /// of that operand for [`Chunk::patch_jump`].
    pub fn write_jump(&mut self, op: OpCode, span: Span) -> usize {
        self.write_op_u16(op, 0xffff, span);
        self.code.len() - 2
    }

    /// Patch a jump's operand so it lands on the next instruction written.
    pub fn patch_jump(&mut self, offset: usize) -> Result<(), CompileError> {
        // offset points to the first byte of the 16-bit jump operand
        let jump_distance = self.code.len() - offset - 2;
        let Ok(word) = u16::try_from(jump_distance) else {
            let span = self.debug.span_at(offset - 1).unwrap_or_default();
            return Err(CompileError::JumpTooLarge(span));
        };
        self.code[offset..offset + 2].copy_from_slice(&word.to_le_bytes());
        Ok(())
    }

    /// Write a `JmpSigned` back to `loop_start`.
    pub fn write_loop(&mut self, loop_start: usize, span: Span) -> Result<(), CompileError> {
        // distance is measured from the end of the operand
        let operand_end = self.code.len() + 1 + 2;
        let distance = loop_start as i64 - operand_end as i64;
        let word = i16::try_from(distance).map_err(|_| CompileError::JumpTooLarge(span))?;
        self.write_op_u16(OpCode::JmpSigned, word as u16, span);
        Ok(())
    }

    /// Get the current offset in the code.
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }
}
