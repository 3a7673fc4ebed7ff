//! Ravel command-line front end: a thin REPL over `ravel-core`. Grounded on
//! `original_source/cli/dispatcher.cpp` for the loop and `examples/ctangam-elk`
//! for argh usage and module layout.

mod repl;

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use argh::FromArgs;
use ravel_core::RavelContext;

#[derive(FromArgs, Debug)]
/// Interactive binary and live-process analysis tool.
struct Args {
    #[argh(positional)]
    /// a binary file to open on startup
    file: Option<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args: Args = argh::from_env();

    let mut ctx = RavelContext::new();

    if let Some(path) = &args.file {
        if let Err(e) = ctx.open_file(path) {
            eprintln!("Error: Failed to open '{path}' (code={}).", e as i32);
            return ExitCode::FAILURE;
        }
        println!("Opened '{path}'.");
    }

    run_loop(&mut ctx)
}

fn run_loop(ctx: &mut RavelContext) -> ExitCode {
    let stdin = io::stdin();
    loop {
        print!("ravel> ");
        if io::stdout().flush().is_err() {
            return ExitCode::SUCCESS;
        }

        let mut line = String::new();
        let bytes_read = match stdin.lock().read_line(&mut line) {
            Ok(n) => n,
            Err(_) => return ExitCode::SUCCESS,
        };
        if bytes_read == 0 {
            println!();
            return ExitCode::SUCCESS;
        }

        match repl::dispatch(ctx, line.trim()) {
            repl::CommandStatus::Ok => continue,
            repl::CommandStatus::ExitRequested => return ExitCode::SUCCESS,
        }
    }
}
