//! Bytecode module for the Lox VM.
//!
//! A compiled program is a single byte buffer: a constant section followed
//! by the instruction stream.
//!
//! # Architecture
//!
//! - `instruction`: OpCode definitions for the bytecode instruction set
//! - `chunk`: Instruction writer and source-location table
//! - `constants`: The deduplicated constant section
//! - `reader`: Bounds-checked sequential decoding
//! - `compiler`: Transforms AST into bytecode
//! - `vm`: Stack-based virtual machine for executing bytecode
//! - `disassembler`: Text listing of a buffer

pub mod chunk;
pub mod compiler;
pub mod constants;
pub mod disassembler;
pub mod instruction;
pub mod reader;
pub mod vm;

pub use chunk::{Chunk, DebugInfo};
pub use compiler::{CompileOutput, Compiler};
pub use constants::ConstantPool;
pub use disassembler::disassemble;
pub use instruction::OpCode;
pub use reader::BytecodeReader;
pub use vm::Vm;
