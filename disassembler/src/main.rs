use std::path::PathBuf;
use std::process::ExitCode;

use disassembler::{Disassembled, disassemble, elide_zero_runs};
use objfile::{Executable, FormatError, Module, Symbol};

use clap::Parser;
use log::debug;

/// VMX20 Disassembler
#[derive(Parser)]
struct Args {
    /// Module (.obj) or executable (.exe) to disassemble
    bin: PathBuf,

    /// Print runs of zero words in full.
    #[arg(long)]
    keep_zeros: bool,
}

fn print_symbols(title: &str, symbols: &[Symbol]) {
    if symbols.is_empty() {
        return;
    }
    println!();
    println!("{title}:");
    for sym in symbols {
        println!("{:08x}\t{}", sym.addr, sym.name);
    }
}

fn run(args: &Args) -> Result<(), FormatError> {
    let bytes = std::fs::read(&args.bin)
        .map_err(|source| FormatError::FileNotFound { path: args.bin.clone(), source })?;

    // An executable is just a module with nothing left to resolve.
    let module = match Executable::from_bytes(&bytes) {
        Ok(exe) => Module { insymbols: exe.symbols, outsymbols: vec![], code: exe.code },
        Err(e) => {
            debug!("Not an executable ({e}), reading as a module");
            Module::from_bytes(&bytes)?
        }
    };

    let mut disassembly = disassemble(&module.code);
    if !args.keep_zeros {
        disassembly = elide_zero_runs(disassembly);
    }

    let mut prev: Option<Disassembled> = None;
    for dis in disassembly {
        if let Some(p) = &prev {
            if p.addr + 1 != dis.addr {
                println!("...");
            }
        }
        println!("{}", dis);
        prev = Some(dis);
    }

    print_symbols("Insymbols", &module.insymbols);
    print_symbols("Outsymbols", &module.outsymbols);
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}
