//! The constant section that prefixes every bytecode buffer.
//!
//! Each entry is `'@' index tag payload`, where `tag` is `'d'` (eight bytes of
//! little-endian `f64`) or `'s'` (UTF-8 text followed by a nul byte). Indices
//! start at zero and increase by one per entry.

use std::collections::HashMap;

use crate::bytecode::reader::BytecodeReader;
use crate::error::{CompileError, Fault};
use crate::span::Span;

/// Leading byte of every constant entry.
pub const MARKER: u8 = b'@';
pub const TAG_NUMBER: u8 = b'd';
pub const TAG_STRING: u8 = b's';

/// Operands are one byte wide, so this is the hard limit per chunk.
pub const MAX_CONSTANTS: usize = 256;

/// Builds the constant section, deduplicating as it goes.
#[derive(Debug, Default)]
pub struct ConstantPool {
    bytes: Vec<u8>,
    count: usize,
    numbers: HashMap<u64, u8>,
    strings: HashMap<String, u8>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct entries.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The encoded section.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Intern a number. Keys are bit patterns, so `0.0` and `-0.0` are
    /// separate entries.
    pub fn add_number(&mut self, value: f64, span: Span) -> Result<u8, CompileError> {
        let key = value.to_bits();
        if let Some(&index) = self.numbers.get(&key) {
            return Ok(index);
        }
        let index = self.next_index(span)?;
        self.bytes.extend_from_slice(&[MARKER, index, TAG_NUMBER]);
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self.numbers.insert(key, index);
        Ok(index)
    }

    /// Intern a string. Global names go through here too, so a name and an
    /// equal string literal share one entry. The payload is nul-terminated,
    /// so a string holding a nul byte cannot be encoded.
    pub fn add_string(&mut self, value: &str, span: Span) -> Result<u8, CompileError> {
        if let Some(&index) = self.strings.get(value) {
            return Ok(index);
        }
        if value.contains('\0') {
            return Err(CompileError::NulInString(span));
        }
        let index = self.next_index(span)?;
        self.bytes.extend_from_slice(&[MARKER, index, TAG_STRING]);
        self.bytes.extend_from_slice(value.as_bytes());
        self.bytes.push(0);
        self.strings.insert(value.to_string(), index);
        Ok(index)
    }

    fn next_index(&mut self, span: Span) -> Result<u8, CompileError> {
        if self.count >= MAX_CONSTANTS {
            return Err(CompileError::TooManyConstants(span));
        }
        let index = self.count as u8;
        self.count += 1;
        Ok(index)
    }
}

/// A decoded constant payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant<'a> {
    Number(f64),
    String(&'a str),
}

/// One decoded entry of the constant section.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantEntry<'a> {
    pub index: u8,
    pub tag: u8,
    pub constant: Constant<'a>,
}

/// Decode the entry at the reader's position. The caller checks for the
/// `'@'` marker with `peek_byte` first.
pub fn read_entry<'a>(reader: &mut BytecodeReader<'a>) -> Result<ConstantEntry<'a>, Fault> {
    reader.read_byte()?;
    let index = reader.read_byte()?;
    let tag_offset = reader.offset();
    let tag = reader.read_byte()?;
    let constant = match tag {
        TAG_NUMBER => Constant::Number(reader.read_double()?),
        TAG_STRING => Constant::String(reader.read_nul_terminated_string()?),
        _ => {
            return Err(Fault::InvalidConstantTag {
                tag,
                offset: tag_offset,
            })
        }
    };
    Ok(ConstantEntry {
        index,
        tag,
        constant,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_are_deduplicated() {
        let mut pool = ConstantPool::new();
        let a = pool.add_number(1.5, Span::default()).unwrap();
        let b = pool.add_number(1.5, Span::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_signed_zeros_are_distinct() {
        let mut pool = ConstantPool::new();
        let a = pool.add_number(0.0, Span::default()).unwrap();
        let b = pool.add_number(-0.0, Span::default()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_string_encoding() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.add_string("x", Span::default()).unwrap(), 0);
        assert_eq!(pool.add_string("x", Span::default()).unwrap(), 0);
        assert_eq!(pool.as_bytes(), b"@\x00sx\x00");
    }

    #[test]
    fn test_string_with_nul_is_rejected() {
        let mut pool = ConstantPool::new();
        let err = pool.add_string("a\0b", Span::new(6, 11, 1, 7));
        assert!(matches!(err, Err(CompileError::NulInString(span)) if span.column == 7));
        assert!(pool.is_empty());
        assert!(pool.as_bytes().is_empty());
    }

    #[test]
    fn test_capacity_limit() {
        let mut pool = ConstantPool::new();
        for i in 0..MAX_CONSTANTS {
            pool.add_number(i as f64, Span::default()).unwrap();
        }
        // Existing entries still resolve once the pool is full.
        assert_eq!(pool.add_number(0.0, Span::default()).unwrap(), 0);
        let err = pool.add_string("one too many", Span::new(3, 5, 1, 4));
        assert!(matches!(err, Err(CompileError::TooManyConstants(_))));
    }

    #[test]
    fn test_read_entry() {
        let mut pool = ConstantPool::new();
        pool.add_number(2.0, Span::default()).unwrap();
        pool.add_string("hi", Span::default()).unwrap();
        let bytes = pool.into_bytes();

        let mut reader = BytecodeReader::new(&bytes);
        let first = read_entry(&mut reader).unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.constant, Constant::Number(2.0));
        let second = read_entry(&mut reader).unwrap();
        assert_eq!(second.index, 1);
        assert_eq!(second.tag, TAG_STRING);
        assert_eq!(second.constant, Constant::String("hi"));
        assert!(reader.is_eof());
    }

    #[test]
    fn test_read_entry_rejects_unknown_tag() {
        let mut reader = BytecodeReader::new(b"@\x00x");
        assert_eq!(
            read_entry(&mut reader),
            Err(Fault::InvalidConstantTag { tag: b'x', offset: 2 })
        );
    }
}
