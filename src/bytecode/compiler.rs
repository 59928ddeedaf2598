//! Bytecode compiler: transforms AST into bytecode.
//!
//! The output buffer is the constant section followed by the instruction
//! stream. Globals are addressed by the pool index of their name; locals by
//! their stack slot, which equals their position in the local list.

use crate::ast::expr::{BinaryOp, Expr, ExprKind, LogicalOp, UnaryOp};
use crate::ast::stmt::{Program, Stmt, StmtKind};
use crate::bytecode::chunk::{Chunk, DebugInfo};
use crate::bytecode::constants::ConstantPool;
use crate::bytecode::instruction::OpCode;
use crate::error::CompileError;
use crate::span::Span;

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Slot operands are one byte wide.
const MAX_LOCALS: usize = 256;

/// Depth of a local that has been declared but whose initializer is still
/// being compiled.
const UNINITIALIZED: i32 = -1;

/// A compiled program: the wire-format buffer plus source locations.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutput {
    /// Constant section followed by instructions.
    pub bytecode: Vec<u8>,
    /// Spans for each instruction, keyed by absolute offset in `bytecode`.
    pub debug: DebugInfo,
    /// Offset of the first instruction.
    pub code_start: usize,
}

/// The bytecode compiler.
pub struct Compiler {
    chunk: Chunk,
    constants: ConstantPool,
    /// Local variables in current scope
    locals: Vec<Local>,
    /// Current scope depth (0 = global)
    scope_depth: i32,
}

/// A local variable in a scope.
#[derive(Debug, Clone)]
struct Local {
    name: String,
    depth: i32,
}

impl Compiler {
    /// Create a new compiler.
    pub fn new() -> Self {
        Self {
            chunk: Chunk::new(),
            constants: ConstantPool::new(),
            locals: Vec::new(),
            scope_depth: 0,
        }
    }

    /// Compile a whole program. Stops at the first error.
    pub fn compile(program: &Program) -> CompileResult<CompileOutput> {
        let mut compiler = Self::new();
        for stmt in &program.statements {
            compiler.compile_statement(stmt)?;
        }
        Ok(compiler.finish())
    }

    fn finish(self) -> CompileOutput {
        let code_start = self.constants.as_bytes().len();
        let constant_count = self.constants.len();
        let mut bytecode = self.constants.into_bytes();
        bytecode.extend_from_slice(&self.chunk.code);

        tracing::debug!(
            constants = constant_count,
            code = self.chunk.code.len(),
            total = bytecode.len(),
            "compiled program"
        );

        CompileOutput {
            bytecode,
            debug: self.chunk.debug.shifted(code_start),
            code_start,
        }
    }

    /// Compile a statement.
    fn compile_statement(&mut self, stmt: &Stmt) -> CompileResult<()> {
        let span = stmt.span;

        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.compile_expression(expr)?;
                self.emit_op(OpCode::Pop, span);
            }

            StmtKind::Print(expr) => {
                self.compile_expression(expr)?;
                self.emit_op(OpCode::Print, span);
            }

            StmtKind::Var { name, initializer } => {
                if self.scope_depth > 0 {
                    // Declared first so the initializer cannot see itself
                    self.declare_local(name, span)?;
                    self.compile_initializer(initializer.as_ref(), span)?;
                    self.mark_initialized();
                } else {
                    self.compile_initializer(initializer.as_ref(), span)?;
                    let name_idx = self.identifier_constant(name, span)?;
                    self.emit_op_u8(OpCode::DefineGlobal, name_idx, span);
                }
            }

            StmtKind::Block(statements) => {
                self.begin_scope();
                for stmt in statements {
                    self.compile_statement(stmt)?;
                }
                self.end_scope(span);
            }

            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.compile_expression(condition)?;

                let then_jump = self.emit_jump(OpCode::JmpFalse, span);
                self.emit_op(OpCode::Pop, span); // Pop condition
                self.compile_statement(then_branch)?;

                let else_jump = self.emit_jump(OpCode::Jmp, span);
                self.patch_jump(then_jump)?;
                self.emit_op(OpCode::Pop, span); // Pop condition

                if let Some(else_stmt) = else_branch {
                    self.compile_statement(else_stmt)?;
                }
                self.patch_jump(else_jump)?;
            }

            StmtKind::While { condition, body } => {
                let loop_start = self.chunk.current_offset();

                self.compile_expression(condition)?;
                let exit_jump = self.emit_jump(OpCode::JmpFalse, span);
                self.emit_op(OpCode::Pop, span);

                self.compile_statement(body)?;

                self.chunk.write_loop(loop_start, span)?;
                self.patch_jump(exit_jump)?;
                self.emit_op(OpCode::Pop, span);
            }

            StmtKind::Function(_) | StmtKind::Return(_) => {
                self.emit_op(OpCode::Trap, span);
            }
        }

        Ok(())
    }

    fn compile_initializer(&mut self, initializer: Option<&Expr>, span: Span) -> CompileResult<()> {
        match initializer {
            Some(init) => self.compile_expression(init),
            None => {
                self.emit_op(OpCode::PushNil, span);
                Ok(())
            }
        }
    }

    /// Compile an expression, leaving exactly one value on the stack.
    fn compile_expression(&mut self, expr: &Expr) -> CompileResult<()> {
        let span = expr.span;

        match &expr.kind {
            ExprKind::Nil => self.emit_op(OpCode::PushNil, span),
            ExprKind::Bool(true) => self.emit_op(OpCode::PushTrue, span),
            ExprKind::Bool(false) => self.emit_op(OpCode::PushFalse, span),
            ExprKind::Number(n) => {
                let idx = self.constants.add_number(*n, span)?;
                self.emit_op_u8(OpCode::PushConstant, idx, span);
            }
            ExprKind::String(s) => {
                let idx = self.constants.add_string(s, span)?;
                self.emit_op_u8(OpCode::PushConstant, idx, span);
            }

            ExprKind::Variable(name) => self.compile_variable_get(name, span)?,

            ExprKind::Assign { name, value } => {
                self.compile_expression(value)?;
                self.compile_variable_set(name, span)?;
            }

            ExprKind::Grouping(inner) => self.compile_expression(inner)?,

            ExprKind::Unary { operator, operand } => {
                self.compile_expression(operand)?;
                let op = match operator {
                    UnaryOp::Negate => OpCode::Neg,
                    UnaryOp::Not => OpCode::Not,
                };
                self.emit_op(op, span);
            }

            ExprKind::Binary {
                left,
                operator,
                right,
            } => {
                self.compile_expression(left)?;
                self.compile_expression(right)?;
                let op = match operator {
                    BinaryOp::Add => OpCode::Add,
                    BinaryOp::Subtract => OpCode::Sub,
                    BinaryOp::Multiply => OpCode::Mul,
                    BinaryOp::Divide => OpCode::Div,
                    BinaryOp::Less => OpCode::Less,
                    BinaryOp::LessEqual => OpCode::LessEqual,
                    BinaryOp::Greater => OpCode::Greater,
                    BinaryOp::GreaterEqual => OpCode::GreaterEqual,
                    BinaryOp::Equal => OpCode::Equal,
                    BinaryOp::NotEqual => OpCode::NotEqual,
                };
                self.emit_op(op, span);
            }

            ExprKind::Logical {
                left,
                operator,
                right,
            } => {
                self.compile_expression(left)?;
                // The left value is the result if it decides the outcome
                let jump_op = match operator {
                    LogicalOp::And => OpCode::JmpFalse,
                    LogicalOp::Or => OpCode::JmpTrue,
                };
                let end_jump = self.emit_jump(jump_op, span);
                self.emit_op(OpCode::Pop, span);
                self.compile_expression(right)?;
                self.patch_jump(end_jump)?;
            }

            ExprKind::Call { .. } => self.emit_op(OpCode::Trap, span),
        }

        Ok(())
    }

    fn compile_variable_get(&mut self, name: &str, span: Span) -> CompileResult<()> {
        match self.resolve_local(name, span)? {
            Some(slot) => self.emit_op_u8(OpCode::GetLocal, slot, span),
            None => {
                let name_idx = self.identifier_constant(name, span)?;
                self.emit_op_u8(OpCode::GetGlobal, name_idx, span);
            }
        }
        Ok(())
    }

    fn compile_variable_set(&mut self, name: &str, span: Span) -> CompileResult<()> {
        match self.resolve_local(name, span)? {
            Some(slot) => self.emit_op_u8(OpCode::SetLocal, slot, span),
            None => {
                let name_idx = self.identifier_constant(name, span)?;
                self.emit_op_u8(OpCode::SetGlobal, name_idx, span);
            }
        }
        Ok(())
    }

    fn begin_scope(&mut self) {
        self.scope_depth += 1;
    }

    fn end_scope(&mut self, span: Span) {
        self.scope_depth -= 1;

        // Pop locals going out of scope, newest first
        while let Some(local) = self.locals.last() {
            if local.depth <= self.scope_depth {
                break;
            }
            self.emit_op(OpCode::Pop, span);
            self.locals.pop();
        }
    }

    fn declare_local(&mut self, name: &str, span: Span) -> CompileResult<()> {
        // Check for duplicate in current scope
        for local in self.locals.iter().rev() {
            if local.depth != UNINITIALIZED && local.depth < self.scope_depth {
                break;
            }
            if local.name == name {
                return Err(CompileError::DuplicateLocal {
                    name: name.to_string(),
                    span,
                });
            }
        }

        if self.locals.len() >= MAX_LOCALS {
            return Err(CompileError::TooManyLocals(span));
        }

        self.locals.push(Local {
            name: name.to_string(),
            depth: UNINITIALIZED,
        });
        Ok(())
    }

    fn mark_initialized(&mut self) {
        if let Some(local) = self.locals.last_mut() {
            local.depth = self.scope_depth;
        }
    }

    fn resolve_local(&self, name: &str, span: Span) -> CompileResult<Option<u8>> {
        for (i, local) in self.locals.iter().enumerate().rev() {
            if local.name == name {
                if local.depth == UNINITIALIZED {
                    return Err(CompileError::SelfReferentialInitializer {
                        name: name.to_string(),
                        span,
                    });
                }
                // declare_local keeps the list within u8 range
                return Ok(Some(i as u8));
            }
        }
        Ok(None)
    }

    fn emit_op(&mut self, op: OpCode, span: Span) {
        self.chunk.write_op(op, span);
    }

    fn emit_op_u8(&mut self, op: OpCode, operand: u8, span: Span) {
        self.chunk.write_op_u8(op, operand, span);
    }

    fn emit_jump(&mut self, op: OpCode, span: Span) -> usize {
        self.chunk.write_jump(op, span)
    }

    fn patch_jump(&mut self, offset: usize) -> CompileResult<()> {
        self.chunk.patch_jump(offset)
    }

    fn identifier_constant(&mut self, name: &str, span: Span) -> CompileResult<u8> {
        self.constants.add_string(name, span)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
