use anyhow::Result;
use rustyline::{error::ReadlineError, DefaultEditor};

use tamarin_core::ast::Parser;
use tamarin_core::token::Lexer;
use tamarin_core::val::{Val, BUILTINS};
use tamarin_core::vm::{Compiler, SymbolTable, Vm};

fn print_repl_help() {
    eprintln!("Commands: :quit | :exit | :q, :help");
}

/// Continue reading while brackets are unbalanced or a trailing `\` asks
/// for another line.
fn should_continue_multiline(buf: &str) -> bool {
    let mut paren = 0i32;
    let mut brace = 0i32;
    let mut bracket = 0i32;
    let mut in_string = false;
    for ch in buf.chars() {
        if ch == '"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        match ch {
            '(' => paren += 1,
            ')' => paren -= 1,
            '{' => brace += 1,
            '}' => brace -= 1,
            '[' => bracket += 1,
            ']' => bracket -= 1,
            _ => {}
        }
    }
    let trailing_backslash = buf.trim_end().ends_with('\\');
    paren > 0 || brace > 0 || bracket > 0 || trailing_backslash
}

pub fn run() -> Result<()> {
    // Session state persists across submissions: names defined on one line
    // stay visible on the next.
    let mut symbols = SymbolTable::new();
    for (index, builtin) in BUILTINS.iter().enumerate() {
        symbols.define_builtin(index, builtin.name);
    }
    let mut constants: Vec<Val> = Vec::new();
    let mut globals: Vec<Val> = Vec::new();

    let mut rl = DefaultEditor::new()?;
    print_repl_help();

    loop {
        let mut acc = String::new();
        loop {
            let prompt = if acc.is_empty() { ">> " } else { ".. " };
            match rl.readline(prompt) {
                Ok(line) => {
                    let trimmed = line.trim_end();

                    if acc.is_empty() && trimmed.starts_with(':') {
                        match trimmed {
                            ":quit" | ":exit" | ":q" => return Ok(()),
                            ":help" => {
                                print_repl_help();
                                break;
                            }
                            _ => {
                                eprintln!("Unknown command. Type :help for help.");
                                break;
                            }
                        }
                    }

                    if let Some(stripped) = trimmed.strip_suffix('\\') {
                        acc.push_str(stripped);
                        acc.push('\n');
                        continue;
                    }

                    acc.push_str(trimmed);
                    acc.push('\n');
                    if !should_continue_multiline(&acc) {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    acc.clear();
                    eprintln!("^C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    if acc.trim().is_empty() {
                        println!();
                        return Ok(());
                    }
                    break;
                }
                Err(err) => {
                    eprintln!("Readline error: {err}");
                    continue;
                }
            }
        }

        let source = acc.trim().to_string();
        if source.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(source.as_str());

        let tokens = match Lexer::tokenize(&source) {
            Ok(tokens) => tokens,
            Err(err) => {
                eprintln!("Error: {err}");
                continue;
            }
        };
        let program = match Parser::new(&tokens).parse_program() {
            Ok(program) => program,
            Err(err) => {
                eprintln!("Error: {err}");
                continue;
            }
        };

        let mut compiler = Compiler::with_state(symbols, constants);
        let compiled = compiler.compile(&program);
        let bytecode = compiler.bytecode();
        (symbols, constants) = compiler.into_state();
        if let Err(err) = compiled {
            eprintln!("Error: {err}");
            continue;
        }

        let mut vm = Vm::with_globals(bytecode, globals);
        let ran = vm.run();
        let result = vm.last_popped_stack_elem();
        globals = vm.into_globals();
        match ran {
            Ok(()) => {
                if !matches!(result, Val::Null) {
                    println!("{result}");
                }
            }
            Err(err) => eprintln!("Error: {err}"),
        }
    }
}
