//! Bytecode instruction definitions for the Lox VM.

/// Opcodes for the bytecode virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Do nothing
    Nop = 0,

    // ============ Arithmetic ============
    /// Add two values: a + b
    Add,
    /// Subtract two values: a - b
    Sub,
    /// Multiply two values: a * b
    Mul,
    /// Divide two values: a / b
    Div,
    /// Negate a value: -a
    Neg,

    // ============ Logic & Comparison ============
    /// Logical not: !a
    Not,
    /// Less than: a < b
    Less,
    /// Less or equal: a <= b
    LessEqual,
    /// Greater than: a > b
    Greater,
    /// Greater or equal: a >= b
    GreaterEqual,
    /// Equal: a == b
    Equal,
    /// Not equal: a != b
    NotEqual,

    // ============ Constants & Stack ============
    /// Push a constant from the constant table: PUSH_CONSTANT <index:u8>
    PushConstant,
    /// Push nil onto the stack
    PushNil,
    /// Push true onto the stack
    PushTrue,
    /// Push false onto the stack
    PushFalse,
    /// Pop the top value from the stack
    Pop,
    /// Pop the top value and print it
    Print,

    // ============ Variables ============
    /// Define a global variable: DEFINE_GLOBAL <name_index:u8>
    DefineGlobal,
    /// Set a global variable: SET_GLOBAL <name_index:u8>
    SetGlobal,
    /// Get a global variable: GET_GLOBAL <name_index:u8>
    GetGlobal,
    /// Set a local variable: SET_LOCAL <slot:u8>
    SetLocal,
    /// Get a local variable: GET_LOCAL <slot:u8>
    GetLocal,

    // ============ Control Flow ============
    /// Unconditional forward jump: JMP <offset:u16>
    Jmp,
    /// Jump if the top is falsy (no pop): JMP_FALSE <offset:u16>
    JmpFalse,
    /// Jump if the top is truthy (no pop): JMP_TRUE <offset:u16>
    JmpTrue,
    /// Relative jump in either direction: JMP_SIGNED <offset:i16>
    JmpSigned,

    /// Unimplemented construct; always faults
    Trap = 255,
}

impl OpCode {
    /// Get the number of operand bytes for this opcode.
    pub fn operand_size(self) -> usize {
        match self {
            OpCode::PushConstant
            | OpCode::DefineGlobal
            | OpCode::SetGlobal
            | OpCode::GetGlobal
            | OpCode::SetLocal
            | OpCode::GetLocal => 1,

            OpCode::Jmp | OpCode::JmpFalse | OpCode::JmpTrue | OpCode::JmpSigned => 2,

            _ => 0,
        }
    }

    /// Lower-case name used by the disassembler.
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Nop => "nop",
            OpCode::Add => "add",
            OpCode::Sub => "sub",
            OpCode::Mul => "mul",
            OpCode::Div => "div",
            OpCode::Neg => "neg",
            OpCode::Not => "not",
            OpCode::Less => "less",
            OpCode::LessEqual => "less_equal",
            OpCode::Greater => "greater",
            OpCode::GreaterEqual => "greater_equal",
            OpCode::Equal => "equal",
            OpCode::NotEqual => "not_equal",
            OpCode::PushConstant => "push_constant",
            OpCode::PushNil => "push_nil",
            OpCode::PushTrue => "push_true",
            OpCode::PushFalse => "push_false",
            OpCode::Pop => "pop",
            OpCode::Print => "print",
            OpCode::DefineGlobal => "define_global",
            OpCode::SetGlobal => "set_global",
            OpCode::GetGlobal => "get_global",
            OpCode::SetLocal => "set_local",
            OpCode::GetLocal => "get_local",
            OpCode::Jmp => "jmp",
            OpCode::JmpFalse => "jmp_false",
            OpCode::JmpTrue => "jmp_true",
            OpCode::JmpSigned => "jmp_signed",
            OpCode::Trap => "trap",
        }
    }

    /// Convert from u8 to OpCode.
    pub fn from_u8(byte: u8) -> Option<OpCode> {
        let op = match byte {
            0 => OpCode::Nop,
            1 => OpCode::Add,
            2 => OpCode::Sub,
            3 => OpCode::Mul,
            4 => OpCode::Div,
            5 => OpCode::Neg,
            6 => OpCode::Not,
            7 => OpCode::Less,
            8 => OpCode::LessEqual,
            9 => OpCode::Greater,
            10 => OpCode::GreaterEqual,
            11 => OpCode::Equal,
            12 => OpCode::NotEqual,
            13 => OpCode::PushConstant,
            14 => OpCode::PushNil,
            15 => OpCode::PushTrue,
            16 => OpCode::PushFalse,
            17 => OpCode::Pop,
            18 => OpCode::Print,
            19 => OpCode::DefineGlobal,
            20 => OpCode::SetGlobal,
            21 => OpCode::GetGlobal,
            22 => OpCode::SetLocal,
            23 => OpCode::GetLocal,
            24 => OpCode::Jmp,
            25 => OpCode::JmpFalse,
            26 => OpCode::JmpTrue,
            27 => OpCode::JmpSigned,
            255 => OpCode::Trap,
            _ => return None,
        };
        Some(op)
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for i in 0..=OpCode::JmpSigned as u8 {
            let op = OpCode::from_u8(i).expect("valid opcode");
            assert_eq!(i, op as u8);
        }
        assert_eq!(OpCode::from_u8(255), Some(OpCode::Trap));
    }

    #[test]
    fn test_invalid_opcode() {
        assert!(OpCode::from_u8(28).is_none());
        assert!(OpCode::from_u8(b'@').is_none());
    }

    #[test]
    fn test_operand_sizes() {
        assert_eq!(OpCode::PushConstant.operand_size(), 1);
        assert_eq!(OpCode::GetLocal.operand_size(), 1);
        assert_eq!(OpCode::JmpSigned.operand_size(), 2);
        assert_eq!(OpCode::Print.operand_size(), 0);
        assert_eq!(OpCode::Trap.operand_size(), 0);
    }
}
