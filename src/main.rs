//! Lox CLI: execute files, evaluate code or run the REPL.

use std::env;
use std::fs;
use std::process;

use tracing_subscriber::EnvFilter;

use loxvm::error::LoxError;
use loxvm::repl::{self, Repl};
use loxvm::RunOptions;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI command to execute.
enum Command {
    /// Run a script file
    Run { file: String },
    /// Evaluate a string
    Eval { code: String },
    /// Start the REPL
    Repl,
}

/// CLI options parsed from arguments.
struct Options {
    command: Command,
    run: RunOptions,
    verbose: bool,
}

fn print_usage() {
    eprintln!("Lox {} - bytecode compiler and VM", VERSION);
    eprintln!();
    eprintln!("Usage: lox [options] [script.lox]");
    eprintln!("       lox [options] -e <code>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -d, --disassemble  Print the bytecode listing and --- before running");
    eprintln!("  --compile-only     Print the bytecode listing without running");
    eprintln!("  -v, --verbose      Log at debug level (RUST_LOG overrides)");
    eprintln!("  -h, --help         Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  lox                       Start interactive REPL");
    eprintln!("  lox script.lox            Run a script file");
    eprintln!("  lox -d script.lox         Show bytecode, then run");
    eprintln!("  lox -e 'print 1 + 2;'     Evaluate code directly");
}

fn usage_error(message: &str) -> ! {
    eprintln!("{}", message);
    print_usage();
    process::exit(64);
}

fn parse_args() -> Options {
    let args: Vec<String> = env::args().collect();
    let mut options = Options {
        command: Command::Repl,
        run: RunOptions::default(),
        verbose: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-d" | "--disassemble" => options.run.disassemble = true,
            "--compile-only" => options.run.compile_only = true,
            "-v" | "--verbose" => options.verbose = true,
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-e" => {
                i += 1;
                if i >= args.len() {
                    usage_error("-e requires a code argument");
                }
                if !matches!(options.command, Command::Repl) {
                    usage_error("Only one script or -e may be given");
                }
                options.command = Command::Eval {
                    code: args[i].clone(),
                };
            }
            arg if arg.starts_with('-') => usage_error(&format!("Unknown option: {}", arg)),
            arg => {
                if !matches!(options.command, Command::Repl) {
                    usage_error(&format!("Unexpected argument: {}", arg));
                }
                options.command = Command::Run {
                    file: arg.to_string(),
                };
            }
        }
        i += 1;
    }

    options
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn exit_code(err: &LoxError) -> i32 {
    match err {
        LoxError::Lexer(_) | LoxError::Parse(_) | LoxError::Compile(_) => 65,
        LoxError::Runtime(_) | LoxError::Fault(_) => 70,
        LoxError::Io(_) => 74,
    }
}

fn main() {
    let options = parse_args();
    init_logging(options.verbose);

    match &options.command {
        Command::Repl => Repl::new(options.run).run(),
        Command::Run { file } => run_file(file, &options),
        Command::Eval { code } => run_source(code, &options),
    }
}

fn run_file(path: &str, options: &Options) {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            repl::report(&LoxError::Io(e));
            process::exit(74);
        }
    };
    tracing::debug!(path, bytes = source.len(), "read script");
    run_source(&source, options);
}

fn run_source(source: &str, options: &Options) {
    if let Err(e) = loxvm::run_with_options(source, options.run) {
        repl::report(&e);
        process::exit(exit_code(&e));
    }
}
