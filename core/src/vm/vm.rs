use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use rustc_hash::FxHashMap;

use crate::val::{Builtin, Closure, CompiledFunction, HashPair, Val, BUILTINS};
use crate::vm::bytecode::{read_u16, Opcode};
use crate::vm::compiler::Bytecode;
use crate::vm::context::VmContext;
use crate::vm::frame::Frame;

pub const STACK_SIZE: usize = 2048;
pub const GLOBALS_SIZE: usize = 65536;
pub const MAX_FRAMES: usize = 1024;

/// Stack machine over compiled bytecode. Owns the operand stack, the
/// globals array, and the frame stack; `run` is a synchronous loop with no
/// yield points.
#[derive(Debug)]
pub struct Vm {
    constants: Vec<Val>,
    stack: Vec<Val>,
    /// Points at the next free stack slot; the top of stack is `sp - 1`.
    sp: usize,
    globals: Vec<Val>,
    frames: Vec<Frame>,
    ctx: VmContext,
}

impl Vm {
    pub fn new(bytecode: Bytecode) -> Self {
        Self::build(bytecode, Vec::new(), VmContext::new())
    }

    /// Reuses a globals array from an earlier run so this program sees
    /// previous definitions. The REPL mode.
    pub fn with_globals(bytecode: Bytecode, globals: Vec<Val>) -> Self {
        Self::build(bytecode, globals, VmContext::new())
    }

    /// Routes builtin output through the given context instead of stdout.
    pub fn with_context(bytecode: Bytecode, ctx: VmContext) -> Self {
        Self::build(bytecode, Vec::new(), ctx)
    }

    fn build(bytecode: Bytecode, mut globals: Vec<Val>, ctx: VmContext) -> Self {
        globals.resize(GLOBALS_SIZE, Val::Null);
        let main_func = CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_parameters: 0,
        };
        let main_closure = Closure {
            func: Arc::new(main_func),
            free: Vec::new(),
        };
        let mut frames = Vec::with_capacity(MAX_FRAMES);
        frames.push(Frame::new(Arc::new(main_closure), 0));
        Self {
            constants: bytecode.constants,
            stack: vec![Val::Null; STACK_SIZE],
            sp: 0,
            globals,
            frames,
            ctx,
        }
    }

    /// The program's result: the value just above the stack pointer, left
    /// there by the final `OpPop` of the last expression statement.
    pub fn last_popped_stack_elem(&self) -> Val {
        self.stack[self.sp].clone()
    }

    /// Hands the globals array back for the next [`Vm::with_globals`].
    pub fn into_globals(self) -> Vec<Val> {
        self.globals
    }

    pub fn run(&mut self) -> Result<()> {
        tracing::debug!(constants = self.constants.len(), "vm run");
        loop {
            let frame = self.current_frame();
            let ip = frame.ip;
            if ip >= frame.instructions().len() {
                break;
            }
            let byte = frame.instructions()[ip];
            let op = Opcode::from_byte(byte).ok_or_else(|| anyhow!("unknown opcode {byte}"))?;
            self.current_frame_mut().ip += 1;

            match op {
                Opcode::Constant => {
                    let index = self.fetch_u16();
                    let value = self.constants[index].clone();
                    self.push(value)?;
                }
                Opcode::Pop => {
                    self.pop()?;
                }
                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                    let right = self.pop()?;
                    let left = self.pop()?;
                    let result = match op {
                        Opcode::Add => &left + &right,
                        Opcode::Sub => &left - &right,
                        Opcode::Mul => &left * &right,
                        _ => &left / &right,
                    }?;
                    self.push(result)?;
                }
                Opcode::True => self.push(Val::Bool(true))?,
                Opcode::False => self.push(Val::Bool(false))?,
                Opcode::Null => self.push(Val::Null)?,
                Opcode::Equal => {
                    let right = self.pop()?;
                    let left = self.pop()?;
                    self.push(Val::Bool(left == right))?;
                }
                Opcode::NotEqual => {
                    let right = self.pop()?;
                    let left = self.pop()?;
                    self.push(Val::Bool(left != right))?;
                }
                Opcode::GreaterThan => {
                    let right = self.pop()?;
                    let left = self.pop()?;
                    match (&left, &right) {
                        (Val::Int(a), Val::Int(b)) => self.push(Val::Bool(a > b))?,
                        _ => bail!(
                            "unknown operator: OpGreaterThan ({} {})",
                            left.type_name(),
                            right.type_name()
                        ),
                    }
                }
                Opcode::Minus => {
                    let operand = self.pop()?;
                    match operand {
                        Val::Int(value) => self.push(Val::Int(value.wrapping_neg()))?,
                        other => bail!("unsupported type for negation: {}", other.type_name()),
                    }
                }
                Opcode::Bang => {
                    let operand = self.pop()?;
                    self.push(Val::Bool(!operand.is_truthy()))?;
                }
                Opcode::JumpNotTruthy => {
                    let target = self.fetch_u16();
                    let condition = self.pop()?;
                    if !condition.is_truthy() {
                        self.current_frame_mut().ip = target;
                    }
                }
                Opcode::Jump => {
                    let target = self.fetch_u16();
                    self.current_frame_mut().ip = target;
                }
                Opcode::SetGlobal => {
                    let index = self.fetch_u16();
                    let value = self.pop()?;
                    self.globals[index] = value;
                }
                Opcode::GetGlobal => {
                    let index = self.fetch_u16();
                    let value = self.globals[index].clone();
                    self.push(value)?;
                }
                Opcode::SetLocal => {
                    let index = self.fetch_u8();
                    let base_pointer = self.current_frame().base_pointer;
                    let value = self.pop()?;
                    self.stack[base_pointer + index] = value;
                }
                Opcode::GetLocal => {
                    let index = self.fetch_u8();
                    let base_pointer = self.current_frame().base_pointer;
                    let value = self.stack[base_pointer + index].clone();
                    self.push(value)?;
                }
                Opcode::GetBuiltin => {
                    let index = self.fetch_u8();
                    self.push(Val::Builtin(&BUILTINS[index]))?;
                }
                Opcode::GetFree => {
                    let index = self.fetch_u8();
                    let value = self.current_frame().closure.free[index].clone();
                    self.push(value)?;
                }
                Opcode::CurrentClosure => {
                    let closure = Arc::clone(&self.current_frame().closure);
                    self.push(Val::Closure(closure))?;
                }
                Opcode::Array => {
                    let count = self.fetch_u16();
                    let elements = self.stack[self.sp - count..self.sp].to_vec();
                    self.sp -= count;
                    self.push(Val::Array(Arc::from(elements)))?;
                }
                Opcode::Hash => {
                    let count = self.fetch_u16();
                    let value = self.build_hash(count)?;
                    self.push(value)?;
                }
                Opcode::Index => {
                    let index = self.pop()?;
                    let left = self.pop()?;
                    self.execute_index(left, index)?;
                }
                Opcode::Call => {
                    let num_args = self.fetch_u8();
                    self.execute_call(num_args)?;
                }
                Opcode::ReturnValue => {
                    let return_value = self.pop()?;
                    // The main frame has no caller to return into.
                    if self.frames.len() == 1 {
                        bail!("return outside of function");
                    }
                    let frame = self.pop_frame();
                    self.sp = frame.base_pointer - 1;
                    self.push(return_value)?;
                }
                Opcode::Return => {
                    if self.frames.len() == 1 {
                        bail!("return outside of function");
                    }
                    let frame = self.pop_frame();
                    self.sp = frame.base_pointer - 1;
                    self.push(Val::Null)?;
                }
                Opcode::Closure => {
                    let const_index = self.fetch_u16();
                    let num_free = self.fetch_u8();
                    self.push_closure(const_index, num_free)?;
                }
            }
        }
        Ok(())
    }

    #[inline]
    fn current_frame(&self) -> &Frame {
        self.frames.last().expect("frame stack is never empty")
    }

    #[inline]
    fn current_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("frame stack is never empty")
    }

    fn pop_frame(&mut self) -> Frame {
        self.frames.pop().expect("frame stack is never empty")
    }

    #[inline]
    fn fetch_u16(&mut self) -> usize {
        let frame = self.current_frame_mut();
        let value = read_u16(&frame.closure.func.instructions[frame.ip..]);
        frame.ip += 2;
        value as usize
    }

    #[inline]
    fn fetch_u8(&mut self) -> usize {
        let frame = self.current_frame_mut();
        let value = frame.closure.func.instructions[frame.ip];
        frame.ip += 1;
        value as usize
    }

    fn push(&mut self, value: Val) -> Result<()> {
        if self.sp >= STACK_SIZE {
            bail!("stack overflow");
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    /// The popped slot is left intact so the host can still read the
    /// program result just above the stack pointer. Popping an empty stack
    /// is reachable from source (a conditional branch that binds a name
    /// produces no value), so it fails instead of panicking.
    fn pop(&mut self) -> Result<Val> {
        if self.sp == 0 {
            bail!("stack underflow");
        }
        self.sp -= 1;
        Ok(self.stack[self.sp].clone())
    }

    fn build_hash(&mut self, count: usize) -> Result<Val> {
        let mut pairs =
            FxHashMap::with_capacity_and_hasher(count / 2, Default::default());
        let start = self.sp - count;
        for slot in (start..self.sp).step_by(2) {
            let key = self.stack[slot].clone();
            let value = self.stack[slot + 1].clone();
            let Some(hash_key) = key.hash_key() else {
                bail!("unusable as hash key: {}", key.type_name());
            };
            pairs.insert(hash_key, HashPair { key, value });
        }
        self.sp = start;
        Ok(Val::Hash(Arc::new(pairs)))
    }

    /// Out-of-range array indices and missing hash keys yield `null`, not
    /// an error; only unindexable containers and unhashable keys fail.
    fn execute_index(&mut self, left: Val, index: Val) -> Result<()> {
        let value = match (&left, &index) {
            (Val::Array(elements), Val::Int(i)) => {
                if *i < 0 {
                    Val::Null
                } else {
                    elements.get(*i as usize).cloned().unwrap_or(Val::Null)
                }
            }
            (Val::Hash(pairs), _) => {
                let Some(key) = index.hash_key() else {
                    bail!("unusable as hash key: {}", index.type_name());
                };
                pairs
                    .get(&key)
                    .map(|pair| pair.value.clone())
                    .unwrap_or(Val::Null)
            }
            _ => bail!("index operator not supported: {}", left.type_name()),
        };
        self.push(value)
    }

    fn execute_call(&mut self, num_args: usize) -> Result<()> {
        let callee = self.stack[self.sp - 1 - num_args].clone();
        match callee {
            Val::Closure(closure) => self.call_closure(closure, num_args),
            Val::Builtin(builtin) => self.call_builtin(builtin, num_args),
            _ => bail!("calling non-closure and non-builtin"),
        }
    }

    fn call_closure(&mut self, closure: Arc<Closure>, num_args: usize) -> Result<()> {
        if num_args != closure.func.num_parameters {
            bail!(
                "wrong number of arguments: want={}, got={}",
                closure.func.num_parameters,
                num_args
            );
        }
        if self.frames.len() >= MAX_FRAMES {
            bail!("frame overflow");
        }
        // Arguments already sit at the bottom of the new frame's local
        // area; only the remaining local slots are reserved.
        let base_pointer = self.sp - num_args;
        let next_sp = base_pointer + closure.func.num_locals;
        if next_sp > STACK_SIZE {
            bail!("stack overflow");
        }
        self.frames.push(Frame::new(closure, base_pointer));
        self.sp = next_sp;
        Ok(())
    }

    fn call_builtin(&mut self, builtin: &'static Builtin, num_args: usize) -> Result<()> {
        let args = self.stack[self.sp - num_args..self.sp].to_vec();
        let result = (builtin.func)(&args, &mut self.ctx);
        // Drop the arguments and the callee slot before pushing the result.
        self.sp -= num_args + 1;
        self.push(result)
    }

    fn push_closure(&mut self, const_index: usize, num_free: usize) -> Result<()> {
        let constant = self.constants[const_index].clone();
        let Val::Func(func) = constant else {
            bail!("not a function: {constant}");
        };
        let free = self.stack[self.sp - num_free..self.sp].to_vec();
        self.sp -= num_free;
        self.push(Val::Closure(Arc::new(Closure { func, free })))
    }
}
