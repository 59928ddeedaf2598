//! Error types for all phases of the toolchain.
//!
//! User-facing errors render as `[line:column] Error: <message>`. Faults are
//! internal invariant violations (a malformed bytecode stream or a `trap`
//! instruction) and render as `internal error: <detail>`.

use std::fmt;
use std::io;

use crate::span::Span;
use thiserror::Error;

/// Lexer errors.
#[derive(Debug, Error)]
pub enum LexerError {
    #[error("[{1}] Error: Unexpected character '{0}'")]
    UnexpectedChar(char, Span),

    #[error("[{0}] Error: Unterminated string")]
    UnterminatedString(Span),

    #[error("[{1}] Error: Invalid number '{0}'")]
    InvalidNumber(String, Span),
}

impl LexerError {
    pub fn unexpected_char(c: char, span: Span) -> Self {
        Self::UnexpectedChar(c, span)
    }

    pub fn unterminated_string(span: Span) -> Self {
        Self::UnterminatedString(span)
    }

    pub fn invalid_number(s: String, span: Span) -> Self {
        Self::InvalidNumber(s, span)
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedChar(_, span) => *span,
            Self::UnterminatedString(span) => *span,
            Self::InvalidNumber(_, span) => *span,
        }
    }
}

/// Parser errors. The parser collects these into a list and keeps going.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("[{span}] Error: Expected {expected}, found '{found}'")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("[{0}] Error: Invalid assignment target")]
    InvalidAssignmentTarget(Span),

    #[error("[{span}] Error: {feature} are not supported")]
    Unsupported { feature: &'static str, span: Span },

    #[error("[{span}] Error: {message}")]
    General { message: String, span: Span },
}

impl ParserError {
    pub fn unexpected_token(
        expected: impl Into<String>,
        found: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
            span,
        }
    }

    pub fn invalid_assignment_target(span: Span) -> Self {
        Self::InvalidAssignmentTarget(span)
    }

    pub fn unsupported(feature: &'static str, span: Span) -> Self {
        Self::Unsupported { feature, span }
    }

    pub fn general(message: impl Into<String>, span: Span) -> Self {
        Self::General {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedToken { span, .. } => *span,
            Self::InvalidAssignmentTarget(span) => *span,
            Self::Unsupported { span, .. } => *span,
            Self::General { span, .. } => *span,
        }
    }
}

impl From<LexerError> for ParserError {
    fn from(err: LexerError) -> Self {
        let span = err.span();
        Self::General {
            message: match err {
                LexerError::UnexpectedChar(c, _) => format!("Unexpected character '{}'", c),
                LexerError::UnterminatedString(_) => "Unterminated string".to_string(),
                LexerError::InvalidNumber(s, _) => format!("Invalid number '{}'", s),
            },
            span,
        }
    }
}

/// Every error the parser reported, in source order.
#[derive(Debug)]
pub struct ParseErrors(pub Vec<ParserError>);

impl ParseErrors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParserError> {
        self.0.iter()
    }
}

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseErrors {}

/// Bytecode compilation errors. Compilation stops at the first one.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("[{0}] Error: Too many constants in one chunk")]
    TooManyConstants(Span),

    #[error("[{0}] Error: Too many local variables in scope")]
    TooManyLocals(Span),

    #[error("[{span}] Error: Variable '{name}' already declared in this scope")]
    DuplicateLocal { name: String, span: Span },

    #[error("[{span}] Error: Can't read local variable '{name}' in its own initializer")]
    SelfReferentialInitializer { name: String, span: Span },

    #[error("[{0}] Error: Too much code to jump over")]
    JumpTooLarge(Span),

    #[error("[{0}] Error: String constant can't contain a nul character")]
    NulInString(Span),
}

impl CompileError {
    pub fn span(&self) -> Span {
        match self {
            Self::TooManyConstants(span) => *span,
            Self::TooManyLocals(span) => *span,
            Self::DuplicateLocal { span, .. } => *span,
            Self::SelfReferentialInitializer { span, .. } => *span,
            Self::JumpTooLarge(span) => *span,
            Self::NulInString(span) => *span,
        }
    }
}

/// Language-level runtime errors raised by the VM.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("[{span}] Error: unsupported binary operation {op} with types '{lhs}' & '{rhs}'")]
    UnsupportedBinary {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
        span: Span,
    },

    #[error("[{span}] Error: unsupported unary operation {op} with type '{operand}'")]
    UnsupportedUnary {
        op: &'static str,
        operand: &'static str,
        span: Span,
    },

    #[error("[{0}] Error: divide by 0")]
    DivisionByZero(Span),

    #[error("[{span}] Error: Undefined global '{name}'")]
    UndefinedGlobal { name: String, span: Span },

    #[error("Error: failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl RuntimeError {
    pub fn unsupported_binary(
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
        span: Span,
    ) -> Self {
        Self::UnsupportedBinary { op, lhs, rhs, span }
    }

    pub fn unsupported_unary(op: &'static str, operand: &'static str, span: Span) -> Self {
        Self::UnsupportedUnary { op, operand, span }
    }

    pub fn division_by_zero(span: Span) -> Self {
        Self::DivisionByZero(span)
    }

    pub fn undefined_global(name: impl Into<String>, span: Span) -> Self {
        Self::UndefinedGlobal {
            name: name.into(),
            span,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::UnsupportedBinary { span, .. } => Some(*span),
            Self::UnsupportedUnary { span, .. } => Some(*span),
            Self::DivisionByZero(span) => Some(*span),
            Self::UndefinedGlobal { span, .. } => Some(*span),
            Self::Output(_) => None,
        }
    }
}

/// Internal invariant violations. These mean the bytecode is malformed or
/// contains a `trap`; they are reported and the run is aborted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Fault {
    #[error("internal error: trap instruction at offset {offset}")]
    Trap { offset: usize },

    #[error("internal error: read of {width} byte(s) at offset {offset} past end of bytecode (length {len})")]
    OutOfBounds {
        offset: usize,
        width: usize,
        len: usize,
    },

    #[error("internal error: invalid opcode {byte:#04x} at offset {offset}")]
    InvalidOpcode { byte: u8, offset: usize },

    #[error("internal error: invalid constant tag {tag:#04x} at offset {offset}")]
    InvalidConstantTag { tag: u8, offset: usize },

    #[error("internal error: constant index {found} out of sequence (expected {expected})")]
    ConstantIndexMismatch { expected: usize, found: u8 },

    #[error("internal error: constant index {0} out of range")]
    InvalidConstantIndex(u8),

    #[error("internal error: global name at constant {0} is not a string")]
    InvalidGlobalName(u8),

    #[error("internal error: local slot {slot} out of range (stack depth {depth})")]
    InvalidLocalSlot { slot: u8, depth: usize },

    #[error("internal error: operand stack underflow")]
    StackUnderflow,

    #[error("internal error: string constant at offset {0} is not valid UTF-8")]
    InvalidUtf8(usize),

    #[error("internal error: string constant at offset {0} has no terminator")]
    UnterminatedString(usize),
}

/// Anything that can stop a VM run.
#[derive(Debug, Error)]
pub enum VmError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Fault(#[from] Fault),
}

/// A unified error type for all phases.
#[derive(Debug, Error)]
pub enum LoxError {
    #[error("{0}")]
    Lexer(#[from] LexerError),

    #[error("{0}")]
    Parse(#[from] ParseErrors),

    #[error("{0}")]
    Compile(#[from] CompileError),

    #[error("{0}")]
    Runtime(#[from] RuntimeError),

    #[error("{0}")]
    Fault(#[from] Fault),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<VmError> for LoxError {
    fn from(err: VmError) -> Self {
        match err {
            VmError::Runtime(e) => Self::Runtime(e),
            VmError::Fault(f) => Self::Fault(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_error_format() {
        let err = RuntimeError::unsupported_binary("add '+'", "Number", "String", Span::new(0, 7, 2, 5));
        assert_eq!(
            err.to_string(),
            "[2:5] Error: unsupported binary operation add '+' with types 'Number' & 'String'"
        );
    }

    #[test]
    fn test_parse_errors_join_lines() {
        let errors = ParseErrors(vec![
            ParserError::invalid_assignment_target(Span::new(0, 1, 1, 1)),
            ParserError::unsupported("classes", Span::new(5, 10, 2, 1)),
        ]);
        assert_eq!(
            errors.to_string(),
            "[1:1] Error: Invalid assignment target\n[2:1] Error: classes are not supported"
        );
    }

    #[test]
    fn test_vm_error_converts_to_lox_error() {
        let err: LoxError = VmError::from(Fault::Trap { offset: 3 }).into();
        assert!(matches!(err, LoxError::Fault(Fault::Trap { offset: 3 })));
        assert_eq!(err.to_string(), "internal error: trap instruction at offset 3");
    }
}
