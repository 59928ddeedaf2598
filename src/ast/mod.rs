//! Abstract Syntax Tree for Lox.

pub mod expr;
pub mod stmt;

pub use expr::{BinaryOp, Expr, ExprKind, LogicalOp, UnaryOp};
pub use stmt::{FunctionDecl, Program, Stmt, StmtKind};
