use std::sync::Arc;

use crate::val::Closure;
use crate::vm::bytecode::Instructions;

/// One function invocation: the closure being run, the instruction
/// pointer into its bytecode, and where its locals start on the operand
/// stack. Locals live at `base_pointer + index`.
#[derive(Debug)]
pub(crate) struct Frame {
    pub closure: Arc<Closure>,
    pub ip: usize,
    pub base_pointer: usize,
}

impl Frame {
    pub fn new(closure: Arc<Closure>, base_pointer: usize) -> Self {
        Self {
            closure,
            ip: 0,
            base_pointer,
        }
    }

    #[inline]
    pub fn instructions(&self) -> &Instructions {
        &self.closure.func.instructions
    }
}
