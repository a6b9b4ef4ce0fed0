use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tamarin_core::ast;
use tamarin_core::token::Lexer;
use tamarin_core::val::Val;
use tamarin_core::vm::{Compiler, Vm};

mod repl;

#[derive(Debug, Parser)]
#[command(
    name = "tamarin",
    author,
    version,
    about = "CLI for the Tamarin language",
    long_about = None
)]
struct CliArgs {
    #[command(subcommand)]
    command: Option<Commands>,

    /// With no subcommand: a source file to execute. Omit it to get a REPL.
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Execute a source file.
    Run {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Compile a source file and print its constant pool and disassembly.
    Disasm {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Start an interactive session.
    Repl,
}

fn main() -> ExitCode {
    init_tracing();
    let args = CliArgs::parse();
    let result = match args.command {
        Some(Commands::Run { file }) => run_file(&file),
        Some(Commands::Disasm { file }) => disasm_file(&file),
        Some(Commands::Repl) => repl::run(),
        None => match args.file {
            Some(file) => run_file(&file),
            None => repl::run(),
        },
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn run_file(path: &Path) -> Result<()> {
    let source = read_source(path)?;
    execute_source(&source)?;
    Ok(())
}

/// The full pipeline for one program: lex, parse, compile, run. Returns
/// the value of the final expression statement.
pub(crate) fn execute_source(source: &str) -> Result<Val> {
    let tokens = Lexer::tokenize(source)?;
    let program = ast::Parser::new(&tokens).parse_program()?;
    let mut compiler = Compiler::new();
    compiler.compile(&program)?;
    let mut vm = Vm::new(compiler.bytecode());
    vm.run()?;
    Ok(vm.last_popped_stack_elem())
}

fn disasm_file(path: &Path) -> Result<()> {
    let source = read_source(path)?;
    let tokens = Lexer::tokenize(&source)?;
    let program = ast::Parser::new(&tokens).parse_program()?;
    let mut compiler = Compiler::new();
    compiler.compile(&program)?;
    let bytecode = compiler.bytecode();

    println!("constants:");
    for (index, constant) in bytecode.constants.iter().enumerate() {
        match constant {
            Val::Func(func) => {
                println!(
                    "{index:04}: fn (locals={}, params={})",
                    func.num_locals, func.num_parameters
                );
                for line in func.instructions.to_string().lines() {
                    println!("      {line}");
                }
            }
            other => println!("{index:04}: {other}"),
        }
    }
    println!();
    println!("instructions:");
    print!("{}", bytecode.instructions);
    Ok(())
}
