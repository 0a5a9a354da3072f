//! `zero`: a just-in-time compiler for Brainfuck, targeting AArch64 on Apple platforms.
//!
//! Takes a single Brainfuck source file, compiles it to native AArch64 machine code, and runs it
//! directly against a 50,000-cell tape — no interpreter, no bytecode.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![allow(clippy::implicit_return)]

use clap::Parser;
use std::process::ExitCode;

use zero::compiler;
use zero::error::Error;
use zero::jit::Jit;
use zero::tape::Tape;

/// Compiles and runs a Brainfuck program as a native AArch64 JIT.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the Brainfuck source file to run
    source: String,
}

fn run(args: &Args) -> Result<i32, Error> {
    let source = std::fs::read(&args.source)?;
    let code = compiler::compile(&source)?;
    let jit = Jit::install(&code)?;
    let mut tape = Tape::new();
    // SAFETY: `tape` owns TAPE_SIZE writable bytes for the duration of this call.
    let status = unsafe { jit.call(tape.as_mut_ptr()) };
    Ok(status)
}

#[allow(clippy::print_stderr)]
fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(status) => match u8::try_from(status) {
            Ok(code) => ExitCode::from(code),
            Err(_) => ExitCode::FAILURE,
        },
        Err(err) => {
            eprintln!("zero: {err}");
            ExitCode::FAILURE
        }
    }
}
