use super::*;
use crate::vm::SymbolTable;
use crate::val::BUILTINS;

/// Drives a REPL-style session: one symbol table, one constant pool and
/// one globals array shared by every submission.
fn run_session(lines: &[&str]) -> Vec<Val> {
    let mut symbols = SymbolTable::new();
    for (index, builtin) in BUILTINS.iter().enumerate() {
        symbols.define_builtin(index, builtin.name);
    }
    let mut constants = Vec::new();
    let mut globals = Vec::new();
    let mut results = Vec::new();

    for line in lines {
        let tokens = Lexer::tokenize(line).expect("lexing failed");
        let program = Parser::new(&tokens)
            .parse_program()
            .expect("parsing failed");
        let mut compiler = Compiler::with_state(symbols, constants);
        compiler.compile(&program).expect("compilation failed");
        let bytecode = compiler.bytecode();
        (symbols, constants) = compiler.into_state();

        let mut vm = Vm::with_globals(bytecode, globals);
        vm.run().expect("program failed");
        results.push(vm.last_popped_stack_elem());
        globals = vm.into_globals();
    }
    results
}

#[test]
fn test_globals_survive_across_submissions() {
    let results = run_session(&["let a = 5;", "a;", "a * 2;"]);
    assert_eq!(results[1], Val::Int(5));
    assert_eq!(results[2], Val::Int(10));
}

#[test]
fn test_functions_defined_earlier_stay_callable() {
    let results = run_session(&[
        "let add = fn(x, y) { x + y };",
        "add(2, 3);",
        "let inc = fn(x) { add(x, 1) };",
        "inc(41);",
    ]);
    assert_eq!(results[1], Val::Int(5));
    assert_eq!(results[3], Val::Int(42));
}

#[test]
fn test_redefinition_takes_a_fresh_global_slot() {
    let results = run_session(&["let a = 1;", "let a = a + 1;", "a;"]);
    assert_eq!(results[2], Val::Int(2));
}

#[test]
fn test_builtins_resolve_in_later_submissions() {
    let results = run_session(&["let xs = [1, 2, 3];", "len(xs);"]);
    assert_eq!(results[1], Val::Int(3));
}

#[test]
fn test_constant_indices_stay_stable() {
    // Later submissions must not disturb constants referenced by earlier
    // compiled functions.
    let results = run_session(&[
        "let f = fn() { 111 };",
        "let g = fn() { 222 };",
        "f() + g();",
    ]);
    assert_eq!(results[2], Val::Int(333));
}
