use anyhow::Result;
use clap::{Parser, Subcommand};
use fen_compiler::{render, Compiler, FenError};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "fen")]
#[command(version)]
#[command(about = "Fen language compiler and runtime", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and execute a Fen source file
    Run {
        /// Input .fen file
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },

    /// Compile a Fen source file without executing it
    Check {
        /// Input .fen file
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },

    /// Parse a Fen source file and dump its AST as JSON
    Ast {
        /// Input .fen file
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { input } => run(&input, true),
        Commands::Check { input } => run(&input, false),
        Commands::Ast { input } => dump_ast(&input),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(input: &Path, execute: bool) -> Result<ExitCode> {
    let source = std::fs::read_to_string(input)?;
    let file = input.display().to_string();

    let mut compiler = Compiler::new();
    if let Err(e) = compiler.initialize() {
        // a prelude failure is a build defect, not a user error
        eprintln!("internal error while loading the prelude:\n{}", e);
        return Ok(ExitCode::FAILURE);
    }
    log::debug!("prelude loaded, compiling {}", file);

    let outcome = if execute {
        compiler.run(&source)
    } else {
        compiler.check(&source).map_err(FenError::Compile)
    };

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(FenError::Compile(e)) => {
            eprint!("{}", render(&e, &file, &source));
            Ok(ExitCode::FAILURE)
        }
        Err(FenError::Runtime(e)) => {
            eprintln!("runtime error: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn dump_ast(input: &Path) -> Result<ExitCode> {
    let source = std::fs::read_to_string(input)?;
    let file = input.display().to_string();
    let program = fen_parser::Parser::new(&source).and_then(|mut p| p.parse());
    match program {
        Ok(program) => {
            println!("{}", serde_json::to_string_pretty(&program)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            let error = fen_diagnostics::CompileError::new(
                fen_diagnostics::ErrorKind::SyntaxError,
                e.to_string(),
                e.span(),
            );
            eprint!("{}", render(&error, &file, &source));
            Ok(ExitCode::FAILURE)
        }
    }
}
