//! Parser module for Lox.

mod core;
mod declarations;
mod expressions;
mod precedence;
mod statements;


pub use self::core::Parser;
