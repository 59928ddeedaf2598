//! Sequential, bounds-checked decoding of a bytecode buffer.

use crate::bytecode::instruction::OpCode;
use crate::error::Fault;

/// A cursor over a bytecode buffer. Every read checks bounds and reports a
/// [`Fault`] instead of panicking.
#[derive(Debug, Clone)]
pub struct BytecodeReader<'a> {
    code: &'a [u8],
    ip: usize,
}

impl<'a> BytecodeReader<'a> {
    pub fn new(code: &'a [u8]) -> Self {
        Self { code, ip: 0 }
    }

    /// Current position in the buffer.
    pub fn offset(&self) -> usize {
        self.ip
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn is_eof(&self) -> bool {
        self.ip >= self.code.len()
    }

    /// The next byte without consuming it, or `None` at end of buffer.
    pub fn peek_byte(&self) -> Option<u8> {
        self.code.get(self.ip).copied()
    }

    pub fn read_byte(&mut self) -> Result<u8, Fault> {
        let bytes = self.take(1)?;
        Ok(bytes[0])
    }

    /// Read a little-endian `u16`.
    pub fn read_word(&mut self) -> Result<u16, Fault> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read a little-endian `i16`.
    pub fn read_signed_word(&mut self) -> Result<i16, Fault> {
        let bytes = self.take(2)?;
        Ok(i16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read a little-endian IEEE-754 double.
    pub fn read_double(&mut self) -> Result<f64, Fault> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(raw))
    }

    /// Read UTF-8 text up to a nul byte, consuming the nul.
    pub fn read_nul_terminated_string(&mut self) -> Result<&'a str, Fault> {
        let start = self.ip;
        let rest = &self.code[start.min(self.code.len())..];
        let Some(len) = rest.iter().position(|&b| b == 0) else {
            return Err(Fault::UnterminatedString(start));
        };
        let text = std::str::from_utf8(&rest[..len]).map_err(|_| Fault::InvalidUtf8(start))?;
        self.ip += len + 1;
        Ok(text)
    }

    /// Read one byte and decode it as an opcode.
    pub fn fetch_opcode(&mut self) -> Result<OpCode, Fault> {
        let offset = self.ip;
        let byte = self.read_byte()?;
        OpCode::from_u8(byte).ok_or(Fault::InvalidOpcode { byte, offset })
    }

    /// Move forward by `distance` bytes. Landing exactly at the end is allowed.
    pub fn jump(&mut self, distance: u16) -> Result<(), Fault> {
        self.seek(self.ip as i64 + distance as i64)
    }

    /// Move by a signed distance relative to the current position.
    pub fn jump_signed(&mut self, distance: i16) -> Result<(), Fault> {
        self.seek(self.ip as i64 + distance as i64)
    }

    fn seek(&mut self, target: i64) -> Result<(), Fault> {
        if target < 0 || target as usize > self.code.len() {
            return Err(Fault::OutOfBounds {
                offset: target.max(0) as usize,
                width: 0,
                len: self.code.len(),
            });
        }
        self.ip = target as usize;
        Ok(())
    }

    fn take(&mut self, width: usize) -> Result<&'a [u8], Fault> {
        let end = self.ip + width;
        if end > self.code.len() {
            return Err(Fault::OutOfBounds {
                offset: self.ip,
                width,
                len: self.code.len(),
            });
        }
        let bytes = &self.code[self.ip..end];
        self.ip = end;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_little_endian() {
        let code = [0x34, 0x12, 0xfe, 0xff];
        let mut reader = BytecodeReader::new(&code);
        assert_eq!(reader.read_word(), Ok(0x1234));
        assert_eq!(reader.read_signed_word(), Ok(-2));
        assert!(reader.is_eof());
    }

    #[test]
    fn test_truncated_reads_fault() {
        let code = [0x01];
        let mut reader = BytecodeReader::new(&code);
        assert_eq!(
            reader.read_word(),
            Err(Fault::OutOfBounds {
                offset: 0,
                width: 2,
                len: 1
            })
        );
        // A failed read does not advance.
        assert_eq!(reader.offset(), 0);

        let mut reader = BytecodeReader::new(&[0u8; 4]);
        assert!(matches!(reader.read_double(), Err(Fault::OutOfBounds { .. })));
    }

    #[test]
    fn test_double_and_string() {
        let mut code = 2.5f64.to_le_bytes().to_vec();
        code.extend_from_slice(b"hi\0");
        let mut reader = BytecodeReader::new(&code);
        assert_eq!(reader.read_double(), Ok(2.5));
        assert_eq!(reader.read_nul_terminated_string(), Ok("hi"));
        assert!(reader.is_eof());
    }

    #[test]
    fn test_string_without_terminator() {
        let mut reader = BytecodeReader::new(b"abc");
        assert_eq!(
            reader.read_nul_terminated_string(),
            Err(Fault::UnterminatedString(0))
        );
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut reader = BytecodeReader::new(&[7, 8]);
        assert_eq!(reader.peek_byte(), Some(7));
        assert_eq!(reader.read_byte(), Ok(7));
        assert_eq!(reader.peek_byte(), Some(8));
    }

    #[test]
    fn test_fetch_invalid_opcode() {
        let mut reader = BytecodeReader::new(&[200]);
        assert_eq!(
            reader.fetch_opcode(),
            Err(Fault::InvalidOpcode {
                byte: 200,
                offset: 0
            })
        );
    }

    #[test]
    fn test_jumps_are_bounds_checked() {
        let code = [0u8; 4];
        let mut reader = BytecodeReader::new(&code);
        assert!(reader.jump(4).is_ok());
        assert!(reader.is_eof());
        assert!(reader.jump_signed(-3).is_ok());
        assert_eq!(reader.offset(), 1);
        assert!(reader.jump_signed(-2).is_err());
        assert!(reader.jump(10).is_err());
    }
}
