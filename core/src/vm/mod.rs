//! Bytecode subsystem: the opcode set and encoder, the symbol table, the
//! compiler that lowers syntax trees to bytecode, and the stack VM that
//! executes it.

mod bytecode;
mod compiler;
mod context;
mod frame;
mod symbols;
#[allow(clippy::module_inception)]
mod vm;

pub use bytecode::{make, read_operands, read_u16, Definition, Instructions, Opcode};
pub use compiler::{Bytecode, Compiler};
pub use context::VmContext;
pub use symbols::{Symbol, SymbolScope, SymbolTable};
pub use vm::{Vm, GLOBALS_SIZE, MAX_FRAMES, STACK_SIZE};
