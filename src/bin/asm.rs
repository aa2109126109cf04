//! Thin assembler front end, spec.md §6.1. Flags mirror
//! `original_source/src/assembler/main.py`'s `argparse` surface by hand —
//! no argument-parsing crate, matching the rest of the corpus.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use mu16::charset::CharSet;

struct Args {
    source: PathBuf,
    output: PathBuf,
    charset: CharSet,
    little_endian: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut source = None;
    let mut output = None;
    let mut charset = CharSet::Cp437;
    let mut little_endian = false;

    let mut it = env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-o" => output = Some(PathBuf::from(it.next().ok_or("-o requires an argument")?)),
            "-c" => {
                let value = it.next().ok_or("-c requires an argument")?;
                charset = match value.as_str() {
                    "cp437" => CharSet::Cp437,
                    "cp850" => CharSet::Cp850,
                    other => return Err(format!("unknown charset '{other}'")),
                };
            }
            "-e" => {
                let value = it.next().ok_or("-e requires an argument")?;
                little_endian = match value.as_str() {
                    "big" => false,
                    "little" => true,
                    other => return Err(format!("unknown byte order '{other}'")),
                };
            }
            other if source.is_none() => source = Some(PathBuf::from(other)),
            other => return Err(format!("unexpected argument '{other}'")),
        }
    }

    let source = source.ok_or("missing source file")?;
    let output = output.unwrap_or_else(|| source.with_extension("bin"));
    Ok(Args { source, output, charset, little_endian })
}

fn swap_word_order(bytes: &mut [u8]) {
    let mut i = 0;
    while i + 1 < bytes.len() {
        bytes.swap(i, i + 1);
        i += 2;
    }
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("mu16-asm: {message}");
            return ExitCode::FAILURE;
        }
    };

    match mu16::assembler::assemble_file(&args.source, args.charset) {
        Ok(mut bytes) => {
            if args.little_endian {
                swap_word_order(&mut bytes);
            }
            let n = bytes.len();
            if let Err(e) = fs::write(&args.output, &bytes) {
                eprintln!("mu16-asm: cannot write '{}': {e}", args.output.display());
                return ExitCode::FAILURE;
            }
            println!("Assembled \"{}\" into {n} bytes.", args.source.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("mu16-asm: {e}");
            ExitCode::FAILURE
        }
    }
}
