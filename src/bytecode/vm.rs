//! Stack-based virtual machine for executing bytecode.

use std::collections::HashMap;
use std::io::{self, Stdout, Write};
use std::rc::Rc;

use crate::bytecode::chunk::DebugInfo;
use crate::bytecode::compiler::CompileOutput;
use crate::bytecode::constants::{self, Constant, MARKER};
use crate::bytecode::instruction::OpCode;
use crate::bytecode::reader::BytecodeReader;
use crate::error::{Fault, RuntimeError, VmError};
use crate::span::Span;
use crate::value::{OpError, Value};

/// Result type for VM operations.
pub type VMResult<T> = Result<T, VmError>;

/// The virtual machine. Output from `print` goes to `W`.
///
/// Globals survive across [`Vm::execute`] calls; the stack and constant
/// table are rebuilt for each buffer.
pub struct Vm<W: Write = Stdout> {
    stack: Vec<Value>,
    constants: Vec<Value>,
    globals: HashMap<Rc<str>, Value>,
    out: W,
}

impl Vm<Stdout> {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Vm<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Vm<W> {
    /// Create a VM that prints to `out`.
    pub fn with_output(out: W) -> Self {
        Self {
            stack: Vec::with_capacity(256),
            constants: Vec::new(),
            globals: HashMap::new(),
            out,
        }
    }

    /// Execute a raw bytecode buffer. Runtime errors carry no source
    /// location.
    pub fn execute(&mut self, code: &[u8]) -> VMResult<()> {
        self.execute_with(code, None)
    }

    /// Execute compiler output, attaching source locations to errors.
    pub fn run(&mut self, output: &CompileOutput) -> VMResult<()> {
        self.execute_with(&output.bytecode, Some(&output.debug))
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn globals(&self) -> &HashMap<Rc<str>, Value> {
        &self.globals
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn output_mut(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    fn execute_with(&mut self, code: &[u8], debug: Option<&DebugInfo>) -> VMResult<()> {
        self.stack.clear();
        self.constants.clear();

        let mut reader = BytecodeReader::new(code);
        self.load_constants(&mut reader)?;

        while !reader.is_eof() {
            let offset = reader.offset();
            let opcode = reader.fetch_opcode()?;
            tracing::trace!(offset, op = opcode.mnemonic(), depth = self.stack.len());

            self.dispatch(opcode, &mut reader)
                .map_err(|err| locate(err, debug, offset))?;
        }

        self.out.flush().map_err(RuntimeError::Output)?;
        tracing::debug!(
            stack = self.stack.len(),
            globals = self.globals.len(),
            "execution finished"
        );
        Ok(())
    }

    fn load_constants(&mut self, reader: &mut BytecodeReader<'_>) -> VMResult<()> {
        while reader.peek_byte() == Some(MARKER) {
            let entry = constants::read_entry(reader)?;
            if entry.index as usize != self.constants.len() {
                return Err(Fault::ConstantIndexMismatch {
                    expected: self.constants.len(),
                    found: entry.index,
                }
                .into());
            }
            let value = match entry.constant {
                Constant::Number(n) => Value::Number(n),
                Constant::String(s) => Value::string(s),
            };
            self.constants.push(value);
        }
        tracing::debug!(constants = self.constants.len(), "loaded constant table");
        Ok(())
    }

    /// Execute one instruction. Errors come back with an empty span and are
    /// located by the caller.
    fn dispatch(&mut self, opcode: OpCode, reader: &mut BytecodeReader<'_>) -> Result<(), Error> {
        match opcode {
            OpCode::Nop => {}

            OpCode::Add => self.binary_op(opcode, Value::add)?,
            OpCode::Sub => self.binary_op(opcode, Value::subtract)?,
            OpCode::Mul => self.binary_op(opcode, Value::multiply)?,
            OpCode::Div => self.binary_op(opcode, Value::divide)?,

            OpCode::Less => self.comparison_op(opcode, Value::cmp_less)?,
            OpCode::LessEqual => self.comparison_op(opcode, Value::cmp_less_equal)?,
            OpCode::Greater => self.comparison_op(opcode, Value::cmp_greater)?,
            OpCode::GreaterEqual => self.comparison_op(opcode, Value::cmp_greater_equal)?,
            OpCode::Equal => self.comparison_op(opcode, Value::cmp_equal)?,
            OpCode::NotEqual => self.comparison_op(opcode, Value::cmp_not_equal)?,

            OpCode::Neg => {
                let value = self.pop()?;
                let result = value
                    .negate()
                    .map_err(|_| Error::UnsupportedUnary(value.type_name()))?;
                self.push(result);
            }

            OpCode::Not => {
                let value = self.pop()?;
                self.push(value.not());
            }

            OpCode::PushConstant => {
                let idx = reader.read_byte()?;
                let value = self.constant(idx)?.clone();
                self.push(value);
            }

            OpCode::PushNil => self.push(Value::NIL),
            OpCode::PushTrue => self.push(Value::TRUE),
            OpCode::PushFalse => self.push(Value::FALSE),

            OpCode::Pop => {
                self.pop()?;
            }

            OpCode::Print => {
                let value = self.pop()?;
                writeln!(self.out, "{}", value).map_err(RuntimeError::Output)?;
            }

            OpCode::DefineGlobal => {
                let name = self.global_name(reader.read_byte()?)?;
                let value = self.pop()?;
                self.globals.insert(name, value);
            }

            OpCode::SetGlobal => {
                let name = self.global_name(reader.read_byte()?)?;
                let value = self.peek()?.clone();
                match self.globals.get_mut(&*name) {
                    Some(slot) => *slot = value,
                    None => return Err(Error::UndefinedGlobal(name)),
                }
            }

            OpCode::GetGlobal => {
                let name = self.global_name(reader.read_byte()?)?;
                let value = match self.globals.get(&*name) {
                    Some(value) => value.clone(),
                    None => return Err(Error::UndefinedGlobal(name)),
                };
                self.push(value);
            }

            OpCode::SetLocal => {
                let slot = reader.read_byte()?;
                let value = self.peek()?.clone();
                *self.local_mut(slot)? = value;
            }

            OpCode::GetLocal => {
                let slot = reader.read_byte()?;
                let value = self.local_mut(slot)?.clone();
                self.push(value);
            }

            OpCode::Jmp => {
                let distance = reader.read_word()?;
                reader.jump(distance)?;
            }

            OpCode::JmpFalse => {
                let distance = reader.read_word()?;
                if !self.peek()?.is_truthy() {
                    reader.jump(distance)?;
                }
            }

            OpCode::JmpTrue => {
                let distance = reader.read_word()?;
                if self.peek()?.is_truthy() {
                    reader.jump(distance)?;
                }
            }

            OpCode::JmpSigned => {
                let distance = reader.read_signed_word()?;
                reader.jump_signed(distance)?;
            }

            OpCode::Trap => {
                return Err(Fault::Trap {
                    offset: reader.offset() - 1,
                }
                .into())
            }
        }

        Ok(())
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Result<Value, Fault> {
        self.stack.pop().ok_or(Fault::StackUnderflow)
    }

    fn peek(&self) -> Result<&Value, Fault> {
        self.stack.last().ok_or(Fault::StackUnderflow)
    }

    fn local_mut(&mut self, slot: u8) -> Result<&mut Value, Fault> {
        let depth = self.stack.len();
        self.stack
            .get_mut(slot as usize)
            .ok_or(Fault::InvalidLocalSlot { slot, depth })
    }

    fn constant(&self, idx: u8) -> Result<&Value, Fault> {
        self.constants
            .get(idx as usize)
            .ok_or(Fault::InvalidConstantIndex(idx))
    }

    fn global_name(&self, idx: u8) -> Result<Rc<str>, Fault> {
        match self.constant(idx)? {
            Value::String(name) => Ok(Rc::clone(name)),
            _ => Err(Fault::InvalidGlobalName(idx)),
        }
    }

    fn binary_op<F>(&mut self, opcode: OpCode, op: F) -> Result<(), Error>
    where
        F: FnOnce(&Value, &Value) -> Result<Value, OpError>,
    {
        let b = self.pop()?;
        let a = self.pop()?;
        let result = op(&a, &b).map_err(|err| match err {
            OpError::DivisionByZero => Error::DivisionByZero,
            OpError::Unsupported => Error::UnsupportedBinary(opcode, a.type_name(), b.type_name()),
        })?;
        self.push(result);
        Ok(())
    }

    fn comparison_op<F>(&mut self, opcode: OpCode, op: F) -> Result<(), Error>
    where
        F: FnOnce(&Value, &Value) -> Option<bool>,
    {
        let b = self.pop()?;
        let a = self.pop()?;
        let result = op(&a, &b)
            .ok_or_else(|| Error::UnsupportedBinary(opcode, a.type_name(), b.type_name()))?;
        self.push(Value::bool(result));
        Ok(())
    }
}

/// Name of a binary or unary operator in runtime error messages.
fn operator_name(opcode: OpCode) -> &'static str {
    match opcode {
        OpCode::Add => "add '+'",
        OpCode::Sub => "subtract '-'",
        OpCode::Mul => "multiply '*'",
        OpCode::Div => "divide '/'",
        OpCode::Less => "less '<'",
        OpCode::LessEqual => "less equal '<='",
        OpCode::Greater => "greater '>'",
        OpCode::GreaterEqual => "greater equal '>='",
        OpCode::Equal => "equal '=='",
        OpCode::NotEqual => "not equal '!='",
        OpCode::Neg => "negate '-'",
        _ => opcode.mnemonic(),
    }
}

/// A failed instruction before its source location is known.
#[derive(Debug)]
enum Error {
    UnsupportedBinary(OpCode, &'static str, &'static str),
    UnsupportedUnary(&'static str),
    DivisionByZero,
    UndefinedGlobal(Rc<str>),
    Runtime(RuntimeError),
    Fault(Fault),
}

impl From<Fault> for Error {
    fn from(fault: Fault) -> Self {
        Error::Fault(fault)
    }
}

impl From<RuntimeError> for Error {
    fn from(err: RuntimeError) -> Self {
        Error::Runtime(err)
    }
}

/// Attach the span of the instruction at `offset` to a failed instruction.
fn locate(err: Error, debug: Option<&DebugInfo>, offset: usize) -> VmError {
    let span = || {
        debug
            .and_then(|d| d.span_at(offset))
            .unwrap_or_else(Span::default)
    };
    match err {
        Error::UnsupportedBinary(opcode, lhs, rhs) => {
            RuntimeError::unsupported_binary(operator_name(opcode), lhs, rhs, span()).into()
        }
        Error::UnsupportedUnary(operand) => {
            RuntimeError::unsupported_unary(operator_name(OpCode::Neg), operand, span()).into()
        }
        Error::DivisionByZero => RuntimeError::division_by_zero(span()).into(),
        Error::UndefinedGlobal(name) => RuntimeError::undefined_global(&*name, span()).into(),
        Error::Runtime(err) => err.into(),
        Error::Fault(fault) => fault.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compiler::Compiler;
    use pretty_assertions::assert_eq;

    fn compile(source: &str) -> CompileOutput {
        let program = crate::parse(source).expect("source parses");
        Compiler::compile(&program).expect("source compiles")
    }

    fn run_source(source: &str) -> (VMResult<()>, String) {
        let mut vm = Vm::with_output(Vec::new());
        let result = vm.run(&compile(source));
        let output = String::from_utf8(vm.into_output()).expect("utf-8 output");
        (result, output)
    }

    fn run_ok(source: &str) -> String {
        let (result, output) = run_source(source);
        result.expect("program runs");
        output
    }

    #[test]
    fn test_simple_arithmetic() {
        assert_eq!(run_ok("print 1 + 2 * 3;"), "7\n");
        assert_eq!(run_ok("print (1 + 2) * 3 - 1;"), "8\n");
        assert_eq!(run_ok("print 7 / 2;"), "3.5\n");
        assert_eq!(run_ok("print -(4);"), "-4\n");
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(run_ok("print \"foo\" + \"bar\";"), "foobar\n");
    }

    #[test]
    fn test_comparisons_and_not() {
        assert_eq!(
            run_ok("print 1 < 2; print 2 <= 1; print 3 > 2; print 2 >= 2; print !nil;"),
            "true\nfalse\ntrue\ntrue\ntrue\n"
        );
        assert_eq!(
            run_ok("print \"a\" == \"a\"; print 1 != 2; print nil == false; print true == 1;"),
            "true\ntrue\nfalse\ntrue\n"
        );
    }

    #[test]
    fn test_shadowing() {
        assert_eq!(
            run_ok("{ var a = 1; { var a = 2; print a; } print a; }"),
            "2\n1\n"
        );
    }

    #[test]
    fn test_stack_is_balanced_after_blocks() {
        let mut vm = Vm::with_output(Vec::new());
        vm.run(&compile("{ var a = 1; var b = 2; a + b; { var c = 3; } }"))
            .unwrap();
        assert!(vm.stack().is_empty());
    }

    #[test]
    fn test_local_assignment() {
        assert_eq!(run_ok("{ var a = 1; a = a + 1; print a; }"), "2\n");
    }

    #[test]
    fn test_unsupported_binary_operation() {
        let (result, _) = run_source("print 1 + \"s\";");
        let err = result.unwrap_err();
        assert_eq!(
            err.to_string(),
            "[1:7] Error: unsupported binary operation add '+' with types 'Number' & 'String'"
        );
    }

    #[test]
    fn test_unsupported_comparison() {
        let (result, _) = run_source("print 1 < \"s\";");
        assert!(matches!(
            result,
            Err(VmError::Runtime(RuntimeError::UnsupportedBinary {
                op: "less '<'",
                ..
            }))
        ));
    }

    #[test]
    fn test_equality_with_mismatched_right_operand() {
        let (result, output) = run_source("print 1 == nil;");
        assert_eq!(output, "");
        assert!(matches!(
            result,
            Err(VmError::Runtime(RuntimeError::UnsupportedBinary {
                op: "equal '=='",
                lhs: "Number",
                rhs: "Nil",
                ..
            }))
        ));

        let (result, _) = run_source("print 1 == true;");
        assert!(matches!(
            result,
            Err(VmError::Runtime(RuntimeError::UnsupportedBinary {
                op: "equal '=='",
                lhs: "Number",
                rhs: "Boolean",
                ..
            }))
        ));

        let (result, _) = run_source("print \"a\" != nil;");
        assert_eq!(
            result.unwrap_err().to_string(),
            "[1:7] Error: unsupported binary operation not equal '!=' with types 'String' & 'Nil'"
        );
    }

    #[test]
    fn test_unsupported_negate() {
        let (result, _) = run_source("print -\"s\";");
        assert!(matches!(
            result,
            Err(VmError::Runtime(RuntimeError::UnsupportedUnary {
                op: "negate '-'",
                operand: "String",
                ..
            }))
        ));
    }

    #[test]
    fn test_division_by_zero() {
        let (result, _) = run_source("print 1 / 0;");
        assert!(matches!(
            result,
            Err(VmError::Runtime(RuntimeError::DivisionByZero(_)))
        ));
    }

    #[test]
    fn test_undefined_global() {
        let (result, _) = run_source("print missing;");
        assert!(matches!(
            result,
            Err(VmError::Runtime(RuntimeError::UndefinedGlobal { ref name, .. })) if name == "missing"
        ));

        let (result, _) = run_source("missing = 1;");
        assert!(matches!(
            result,
            Err(VmError::Runtime(RuntimeError::UndefinedGlobal { .. }))
        ));
    }

    #[test]
    fn test_globals_persist_across_executions() {
        let mut vm = Vm::with_output(Vec::new());
        vm.execute(&compile("var a = 40;").bytecode).unwrap();
        vm.execute(&compile("a = a + 2; print a;").bytecode).unwrap();

        assert_eq!(vm.global("a"), Some(&Value::Number(42.0)));
        assert_eq!(String::from_utf8(vm.into_output()).unwrap(), "42\n");
    }

    #[test]
    fn test_global_names_share_constant_storage() {
        let mut vm = Vm::with_output(Vec::new());
        vm.execute(&compile("var greeting = \"greeting\";").bytecode)
            .unwrap();

        let (name, value) = vm.globals().iter().next().unwrap();
        match value {
            Value::String(text) => assert!(Rc::ptr_eq(name, text)),
            other => panic!("Expected string global, got {:?}", other),
        }
        assert_eq!(vm.global("greeting"), Some(&Value::from("greeting")));
    }

    #[test]
    fn test_execute_has_no_locations() {
        let mut vm = Vm::with_output(Vec::new());
        let err = vm.execute(&compile("print 1 / 0;").bytecode).unwrap_err();
        assert_eq!(err.to_string(), "[0:0] Error: divide by 0");
    }

    #[test]
    fn test_while_loop() {
        assert_eq!(
            run_ok("var i = 0; while (i < 3) { print i; i = i + 1; }"),
            "0\n1\n2\n"
        );
    }

    #[test]
    fn test_for_loop() {
        assert_eq!(
            run_ok("for (var i = 0; i < 3; i = i + 1) print i;"),
            "0\n1\n2\n"
        );
    }

    #[test]
    fn test_if_else() {
        assert_eq!(
            run_ok("if (1 < 2) print \"yes\"; else print \"no\";"),
            "yes\n"
        );
        assert_eq!(run_ok("if (nil) print \"yes\"; else print \"no\";"), "no\n");
        assert_eq!(run_ok("if (false) print 1; print 2;"), "2\n");
    }

    #[test]
    fn test_and_or_short_circuit() {
        assert_eq!(
            run_ok("print nil and missing; print 1 or missing; print false or 2; print 1 and 3;"),
            "nil\n1\n2\n3\n"
        );

        let mut vm = Vm::with_output(Vec::new());
        vm.run(&compile("true and false;")).unwrap();
        assert!(vm.stack().is_empty());
    }

    #[test]
    fn test_call_traps() {
        let (result, output) = run_source("print 1; f();");
        assert_eq!(output, "1\n");
        assert!(matches!(
            result,
            Err(VmError::Fault(Fault::Trap { .. }))
        ));
    }

    #[test]
    fn test_truncated_buffer_faults() {
        let code = compile("print 1;").bytecode;
        let mut vm = Vm::with_output(Vec::new());
        let err = vm.execute(&code[..5]).unwrap_err();
        assert!(matches!(err, VmError::Fault(Fault::OutOfBounds { .. })));

        let err = vm.execute(&[OpCode::Jmp as u8, 0x01]).unwrap_err();
        assert!(matches!(err, VmError::Fault(Fault::OutOfBounds { .. })));
    }

    #[test]
    fn test_malformed_buffers_fault() {
        let mut vm = Vm::with_output(Vec::new());
        assert!(matches!(
            vm.execute(&[OpCode::Pop as u8]),
            Err(VmError::Fault(Fault::StackUnderflow))
        ));
        assert!(matches!(
            vm.execute(&[OpCode::PushConstant as u8, 3]),
            Err(VmError::Fault(Fault::InvalidConstantIndex(3)))
        ));
        assert!(matches!(
            vm.execute(&[OpCode::GetLocal as u8, 0]),
            Err(VmError::Fault(Fault::InvalidLocalSlot { slot: 0, depth: 0 }))
        ));
        assert!(matches!(
            vm.execute(b"@\x01s\x00"),
            Err(VmError::Fault(Fault::ConstantIndexMismatch {
                expected: 0,
                found: 1
            }))
        ));
        assert!(matches!(
            vm.execute(&[100]),
            Err(VmError::Fault(Fault::InvalidOpcode { byte: 100, .. }))
        ));
    }
}
