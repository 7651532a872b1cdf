//! `glintc`: compile and run a Glint source file.
//!
//! Single positional argument, no subcommands: compile straight to
//! bytecode and execute it. Logging goes to stderr via
//! `tracing`/`tracing-subscriber`, controlled by `RUST_LOG`; program
//! `print` output always goes to stdout regardless of the log level.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use glint_compiler::compile_source;
use glint_runtime::Vm;

#[derive(Parser)]
#[command(name = "glintc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile and run a Glint source file", long_about = None)]
struct Cli {
    /// Glint source file to compile and run.
    input: PathBuf,

    /// Disassemble every compiled entity to stderr before running.
    #[arg(long)]
    dump_bytecode: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let source = match std::fs::read_to_string(&cli.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("glintc: cannot read '{}': {e}", cli.input.display());
            return ExitCode::from(1);
        }
    };

    let compiled = match compile_source(&source) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };

    tracing::debug!(
        entities = compiled.entities.len(),
        script_bytes = compiled.script.len(),
        "compiled"
    );

    let vm = Vm::new(compiled.entities, compiled.constants, compiled.script)
        .with_dump_bytecode(cli.dump_bytecode);
    let code = vm.run();
    ExitCode::from(code as u8)
}
