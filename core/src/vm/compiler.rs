use std::mem;
use std::sync::Arc;

use anyhow::{bail, Result};

use crate::ast::{Block, Expr, Program, Stmt};
use crate::val::{CompiledFunction, Val, BUILTINS};
use crate::vm::bytecode::{make, Instructions, Opcode};
use crate::vm::symbols::{SymbolScope, SymbolTable};

/// The compiled program: main-scope instructions plus the shared constant
/// pool. What the VM executes.
#[derive(Debug, Clone)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Val>,
}

#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

/// Instructions under construction for one function body, along with the
/// last two emissions. Remembering just those two positions is enough for
/// the trailing-`Pop` rewrites the lowering needs.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last: Option<EmittedInstruction>,
    previous: Option<EmittedInstruction>,
}

pub struct Compiler {
    constants: Vec<Val>,
    scopes: Vec<CompilationScope>,
    scope_index: usize,
    symbols: SymbolTable,
}

impl Compiler {
    pub fn new() -> Self {
        let mut symbols = SymbolTable::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            symbols.define_builtin(index, builtin.name);
        }
        Self::assemble(symbols, Vec::new())
    }

    /// Continues a session: the symbol table and constants carry over from
    /// earlier compilations so new code sees old definitions.
    pub fn with_state(symbols: SymbolTable, constants: Vec<Val>) -> Self {
        Self::assemble(symbols, constants)
    }

    fn assemble(symbols: SymbolTable, constants: Vec<Val>) -> Self {
        Self {
            constants,
            scopes: vec![CompilationScope::default()],
            scope_index: 0,
            symbols,
        }
    }

    pub fn compile(&mut self, program: &Program) -> Result<()> {
        for stmt in &program.statements {
            self.compile_stmt(stmt)?;
        }
        tracing::debug!(
            bytes = self.current_scope().instructions.len(),
            constants = self.constants.len(),
            "compiled program"
        );
        Ok(())
    }

    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.current_scope().instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    /// Hands the session state back for the next [`Compiler::with_state`].
    pub fn into_state(self) -> (SymbolTable, Vec<Val>) {
        (self.symbols, self.constants)
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Expr { expression } => {
                self.compile_expr(expression)?;
                // Balances the stack across statements; also what makes
                // the final value observable as the last popped element.
                self.emit(Opcode::Pop, &[]);
            }
            Stmt::Let { name, value } => {
                // The value compiles before the name is defined, so
                // `let x = x;` resolves to an outer x.
                self.compile_expr(value)?;
                let symbol = self.symbols.define(name);
                match symbol.scope {
                    SymbolScope::Global => self.emit(Opcode::SetGlobal, &[symbol.index]),
                    _ => self.emit(Opcode::SetLocal, &[symbol.index]),
                };
            }
            Stmt::Return { value } => {
                self.compile_expr(value)?;
                self.emit(Opcode::ReturnValue, &[]);
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &Block) -> Result<()> {
        for stmt in &block.statements {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    fn compile_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Int(value) => {
                let index = self.add_constant(Val::Int(*value));
                self.emit(Opcode::Constant, &[index]);
            }
            Expr::Str(value) => {
                let index = self.add_constant(Val::from(value.as_str()));
                self.emit(Opcode::Constant, &[index]);
            }
            Expr::Bool(true) => {
                self.emit(Opcode::True, &[]);
            }
            Expr::Bool(false) => {
                self.emit(Opcode::False, &[]);
            }
            Expr::Ident(name) => {
                let Some(symbol) = self.symbols.resolve(name) else {
                    bail!("undefined variable {name}");
                };
                self.load_symbol(symbol.scope, symbol.index);
            }
            Expr::Prefix { operator, right } => {
                self.compile_expr(right)?;
                match operator.as_str() {
                    "!" => self.emit(Opcode::Bang, &[]),
                    "-" => self.emit(Opcode::Minus, &[]),
                    other => bail!("unknown operator {other}"),
                };
            }
            Expr::Infix {
                operator,
                left,
                right,
            } => self.compile_infix(operator, left, right)?,
            Expr::If {
                condition,
                consequence,
                alternative,
            } => self.compile_if(condition, consequence, alternative.as_ref())?,
            Expr::Array(elements) => {
                for element in elements {
                    self.compile_expr(element)?;
                }
                self.emit(Opcode::Array, &[elements.len()]);
            }
            Expr::Hash(pairs) => {
                // Sort by the keys' printed form so the same source always
                // yields byte-identical bytecode.
                let mut ordered: Vec<&(Expr, Expr)> = pairs.iter().collect();
                ordered.sort_by_key(|(key, _)| key.to_string());
                for (key, value) in ordered {
                    self.compile_expr(key)?;
                    self.compile_expr(value)?;
                }
                self.emit(Opcode::Hash, &[pairs.len() * 2]);
            }
            Expr::Index { left, index } => {
                self.compile_expr(left)?;
                self.compile_expr(index)?;
                self.emit(Opcode::Index, &[]);
            }
            Expr::Function {
                name,
                parameters,
                body,
            } => self.compile_function(name.as_deref(), parameters, body)?,
            Expr::Call {
                function,
                arguments,
            } => {
                self.compile_expr(function)?;
                for argument in arguments {
                    self.compile_expr(argument)?;
                }
                self.emit(Opcode::Call, &[arguments.len()]);
            }
        }
        Ok(())
    }

    fn compile_infix(&mut self, operator: &str, left: &Expr, right: &Expr) -> Result<()> {
        // There is no less-than opcode: `a < b` compiles its operands in
        // reverse and reuses OpGreaterThan.
        if operator == "<" {
            self.compile_expr(right)?;
            self.compile_expr(left)?;
            self.emit(Opcode::GreaterThan, &[]);
            return Ok(());
        }
        self.compile_expr(left)?;
        self.compile_expr(right)?;
        match operator {
            "+" => self.emit(Opcode::Add, &[]),
            "-" => self.emit(Opcode::Sub, &[]),
            "*" => self.emit(Opcode::Mul, &[]),
            "/" => self.emit(Opcode::Div, &[]),
            ">" => self.emit(Opcode::GreaterThan, &[]),
            "==" => self.emit(Opcode::Equal, &[]),
            "!=" => self.emit(Opcode::NotEqual, &[]),
            other => bail!("unknown operator {other}"),
        };
        Ok(())
    }

    fn compile_if(
        &mut self,
        condition: &Expr,
        consequence: &Block,
        alternative: Option<&Block>,
    ) -> Result<()> {
        self.compile_expr(condition)?;
        // Placeholder target, backpatched once the consequence length is
        // known.
        let jump_not_truthy = self.emit(Opcode::JumpNotTruthy, &[9999]);

        self.compile_block(consequence)?;
        if self.last_instruction_is(Opcode::Pop) {
            self.remove_last_pop();
        }
        let jump = self.emit(Opcode::Jump, &[9999]);

        let after_consequence = self.current_scope().instructions.len();
        self.change_operand(jump_not_truthy, after_consequence);

        match alternative {
            None => {
                self.emit(Opcode::Null, &[]);
            }
            Some(alternative) => {
                self.compile_block(alternative)?;
                if self.last_instruction_is(Opcode::Pop) {
                    self.remove_last_pop();
                }
            }
        }
        let after_alternative = self.current_scope().instructions.len();
        self.change_operand(jump, after_alternative);
        Ok(())
    }

    fn compile_function(
        &mut self,
        name: Option<&str>,
        parameters: &[String],
        body: &Block,
    ) -> Result<()> {
        self.enter_scope();
        if let Some(name) = name {
            // Must precede the parameters so the body resolves the name to
            // the currently running closure.
            self.symbols.define_function_name(name);
        }
        for parameter in parameters {
            self.symbols.define(parameter);
        }

        self.compile_block(body)?;
        if self.last_instruction_is(Opcode::Pop) {
            self.replace_last_pop_with_return();
        }
        if !self.last_instruction_is(Opcode::ReturnValue) {
            self.emit(Opcode::Return, &[]);
        }

        let free_symbols = self.symbols.free_symbols.clone();
        let num_locals = self.symbols.num_definitions;
        let instructions = self.leave_scope();

        // Restore the captured values onto the outer scope's stack, in
        // capture order, for OpClosure to collect.
        for symbol in &free_symbols {
            self.load_symbol(symbol.scope, symbol.index);
        }

        let func = CompiledFunction {
            instructions,
            num_locals,
            num_parameters: parameters.len(),
        };
        let index = self.add_constant(Val::Func(Arc::new(func)));
        self.emit(Opcode::Closure, &[index, free_symbols.len()]);
        Ok(())
    }

    fn load_symbol(&mut self, scope: SymbolScope, index: usize) {
        match scope {
            SymbolScope::Global => self.emit(Opcode::GetGlobal, &[index]),
            SymbolScope::Local => self.emit(Opcode::GetLocal, &[index]),
            SymbolScope::Builtin => self.emit(Opcode::GetBuiltin, &[index]),
            SymbolScope::Free => self.emit(Opcode::GetFree, &[index]),
            SymbolScope::Function => self.emit(Opcode::CurrentClosure, &[]),
        };
    }

    /// Appends to the constant pool and returns the new index. No
    /// deduplication: identical literals get distinct slots.
    fn add_constant(&mut self, value: Val) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    fn emit(&mut self, op: Opcode, operands: &[usize]) -> usize {
        let instruction = make(op, operands);
        let scope = self.current_scope_mut();
        let position = scope.instructions.0.len();
        scope.instructions.0.extend_from_slice(&instruction);
        scope.previous = scope.last;
        scope.last = Some(EmittedInstruction {
            opcode: op,
            position,
        });
        position
    }

    fn last_instruction_is(&self, op: Opcode) -> bool {
        matches!(self.current_scope().last, Some(last) if last.opcode == op)
    }

    /// Drops a trailing `OpPop`, turning the statement back into an
    /// expression that leaves its value on the stack.
    fn remove_last_pop(&mut self) {
        let scope = self.current_scope_mut();
        if let Some(last) = scope.last {
            scope.instructions.0.truncate(last.position);
            scope.last = scope.previous;
        }
    }

    /// Rewrites a trailing `OpPop` in place as `OpReturnValue`; both are a
    /// single byte, so no operands shift.
    fn replace_last_pop_with_return(&mut self) {
        let scope = self.current_scope_mut();
        if let Some(last) = &mut scope.last {
            scope.instructions.0[last.position] = Opcode::ReturnValue as u8;
            last.opcode = Opcode::ReturnValue;
        }
    }

    /// Re-encodes the operand of the instruction at `position`. Only used
    /// for jump backpatching, where the widths never change.
    fn change_operand(&mut self, position: usize, operand: usize) {
        let scope = self.current_scope_mut();
        let op = Opcode::from_byte(scope.instructions.0[position])
            .expect("backpatch position does not hold an opcode");
        let instruction = make(op, &[operand]);
        scope.instructions.0[position..position + instruction.len()]
            .copy_from_slice(&instruction);
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        self.scope_index += 1;
        self.symbols = SymbolTable::enclosed(mem::take(&mut self.symbols));
    }

    fn leave_scope(&mut self) -> Instructions {
        let scope = self.scopes.pop().expect("scope stack underflow");
        self.scope_index -= 1;
        self.symbols = mem::take(&mut self.symbols)
            .into_outer()
            .expect("leave_scope without matching enter_scope");
        scope.instructions
    }

    fn current_scope(&self) -> &CompilationScope {
        &self.scopes[self.scope_index]
    }

    fn current_scope_mut(&mut self) -> &mut CompilationScope {
        &mut self.scopes[self.scope_index]
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
