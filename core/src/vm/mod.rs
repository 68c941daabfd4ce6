//! Register VM code generation.
//!
//! Instruction set, per-function compilation state, the global compiler
//! state that owns every function of a compilation unit, and the tree-walking
//! compiler that fills them in.

mod bytecode;
mod compiler;
pub mod disasm;
mod function;
mod state;

pub use bytecode::Op;
pub use compiler::*;
pub use disasm::disassemble;
pub use function::{Function, FunctionId, UpvalueDesc};
pub use state::State;

#[cfg(test)]
mod compiler_test;
