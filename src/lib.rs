//! Lox: a small dynamically-typed scripting language compiled to bytecode.
//!
//! This is the library root that exports all modules.
//!
//! # Pipeline
//!
//! Source text is scanned into tokens, parsed into an AST, compiled into a
//! single bytecode buffer (constant section followed by instructions) and
//! executed on a stack VM.

#![allow(clippy::result_large_err)]
#![allow(clippy::new_without_default)]

pub mod ast;
pub mod bytecode;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod span;
pub mod value;

use std::io::{Stdout, Write};

use bytecode::{CompileOutput, Compiler, Vm};
use error::{LoxError, ParseErrors};

/// Options controlling what a run does besides executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOptions {
    /// Print the disassembly followed by `---` before executing.
    pub disassemble: bool,
    /// Print the disassembly and stop without executing.
    pub compile_only: bool,
}

/// A VM plus options that persists across evaluations, so globals defined
/// by one call are visible to the next.
pub struct Session<W: Write = Stdout> {
    vm: Vm<W>,
    options: RunOptions,
}

impl Session<Stdout> {
    pub fn new(options: RunOptions) -> Self {
        Self::with_output(options, std::io::stdout())
    }
}

impl<W: Write> Session<W> {
    /// Create a session whose program output and disassembly go to `out`.
    pub fn with_output(options: RunOptions, out: W) -> Self {
        Self {
            vm: Vm::with_output(out),
            options,
        }
    }

    /// Compile and run one piece of source.
    pub fn eval(&mut self, source: &str) -> Result<(), LoxError> {
        let output = compile(source)?;

        if self.options.disassemble || self.options.compile_only {
            let listing = bytecode::disassemble(&output.bytecode)?;
            let out = self.vm.output_mut();
            out.write_all(listing.as_bytes())?;
            if self.options.compile_only {
                out.flush()?;
                return Ok(());
            }
            writeln!(out, "---")?;
        }

        self.vm.run(&output)?;
        Ok(())
    }

    pub fn vm(&self) -> &Vm<W> {
        &self.vm
    }

    pub fn into_output(self) -> W {
        self.vm.into_output()
    }
}

/// Run a Lox program, printing to stdout.
pub fn run(source: &str) -> Result<(), LoxError> {
    run_with_options(source, RunOptions::default())
}

/// Run a Lox program with full control over execution options.
pub fn run_with_options(source: &str, options: RunOptions) -> Result<(), LoxError> {
    Session::new(options).eval(source)
}

/// Parse source code into an AST without executing.
pub fn parse(source: &str) -> Result<ast::Program, LoxError> {
    let tokens = lexer::Scanner::new(source).scan_tokens()?;
    let program = parser::Parser::new(tokens).parse().map_err(ParseErrors)?;
    Ok(program)
}

/// Compile source code to bytecode without executing.
pub fn compile(source: &str) -> Result<CompileOutput, LoxError> {
    let program = parse(source)?;
    let output = Compiler::compile(&program)?;
    Ok(output)
}

/// Compile source code and return its disassembly.
pub fn disassemble(source: &str) -> Result<String, LoxError> {
    let output = compile(source)?;
    Ok(bytecode::disassemble(&output.bytecode)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn eval_with(options: RunOptions, source: &str) -> (Result<(), LoxError>, String) {
        let mut session = Session::with_output(options, Vec::new());
        let result = session.eval(source);
        (result, String::from_utf8(session.into_output()).unwrap())
    }

    #[test]
    fn test_session_keeps_globals() {
        let mut session = Session::with_output(RunOptions::default(), Vec::new());
        session.eval("var greeting = \"hi\";").unwrap();
        session.eval("print greeting + \" there\";").unwrap();
        assert_eq!(String::from_utf8(session.into_output()).unwrap(), "hi there\n");
    }

    #[test]
    fn test_disassemble_before_running() {
        let options = RunOptions {
            disassemble: true,
            ..RunOptions::default()
        };
        let (result, output) = eval_with(options, "print 1;");
        result.unwrap();
        assert_eq!(output, "@0d 1\npush_constant 0\nprint\n---\n1\n");
    }

    #[test]
    fn test_compile_only_does_not_run() {
        let options = RunOptions {
            compile_only: true,
            ..RunOptions::default()
        };
        let (result, output) = eval_with(options, "print nil;");
        result.unwrap();
        assert_eq!(output, "push_nil\nprint\n");
    }

    #[test]
    fn test_errors_by_phase() {
        assert!(matches!(parse("print @;"), Err(LoxError::Lexer(_))));
        assert!(matches!(parse("print ;"), Err(LoxError::Parse(_))));
        assert!(matches!(compile("{ var a = a; }"), Err(LoxError::Compile(_))));

        let (result, _) = eval_with(RunOptions::default(), "print -nil;");
        assert!(matches!(result, Err(LoxError::Runtime(_))));

        let (result, _) = eval_with(RunOptions::default(), "fun f() {}");
        assert!(matches!(result, Err(LoxError::Fault(_))));
    }

    #[test]
    fn test_disassemble_source() {
        assert_eq!(
            disassemble("var a = 1;").unwrap(),
            "@0d 1\n@1s \"a\"\npush_constant 0\ndefine_global 1\n"
        );
    }
}
