//! Thin emulator front end, spec.md §6.1.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use mu16::emulator::{Config, Emulator};
use mu16::error::StopReason;

struct Args {
    program: PathBuf,
    max_cycles: Option<u64>,
}

fn parse_args() -> Result<Args, String> {
    let mut program = None;
    let mut max_cycles = None;

    let mut it = env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--max-cycles" => {
                let value = it.next().ok_or("--max-cycles requires an argument")?;
                max_cycles = Some(value.parse::<u64>().map_err(|_| format!("invalid cycle count '{value}'"))?);
            }
            other if program.is_none() => program = Some(PathBuf::from(other)),
            other => return Err(format!("unexpected argument '{other}'")),
        }
    }

    let program = program.ok_or("missing binary file")?;
    Ok(Args { program, max_cycles })
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("mu16-emu: {message}");
            return ExitCode::FAILURE;
        }
    };

    let bytes = match fs::read(&args.program) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("mu16-emu: cannot read '{}': {e}", args.program.display());
            return ExitCode::FAILURE;
        }
    };

    let mut config = Config::default();
    config.max_cycles = args.max_cycles;
    let mut emulator = Emulator::new(config);
    if let Err(e) = emulator.load(&bytes, 0) {
        eprintln!("mu16-emu: {e}");
        return ExitCode::FAILURE;
    }

    match emulator.run(-1) {
        Ok(StopReason::Halt) => ExitCode::SUCCESS,
        Ok(StopReason::StepsExhausted) => ExitCode::SUCCESS,
        Ok(StopReason::CycleLimit) => {
            eprintln!("mu16-emu: stopped at cycle limit without halting");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("mu16-emu: {e}");
            ExitCode::FAILURE
        }
    }
}
