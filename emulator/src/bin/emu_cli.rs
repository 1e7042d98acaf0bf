use std::path::PathBuf;
use std::process::ExitCode;

use common::constants::{ENTRY_POINT, MEM_WORDS};
use emu_lib::{Vm, VmConfig, VmError, spaced_stack_pointers};

use clap::Parser;
use log::info;


/// VMX20 multi-processor emulator
#[derive(Parser)]
struct Args {
    /// Executable to run
    exe: PathBuf,

    /// Number of processors, all starting at address 0.
    #[arg(short = 'n', long, default_value_t = 1)]
    processors: usize,

    /// Words of stack per processor, carved from the top of memory.
    #[arg(long, default_value_t = 10_000)]
    stack_size: usize,

    /// Total memory in words.
    #[arg(long, default_value_t = MEM_WORDS)]
    mem_words: usize,

    /// Print each instruction and the registers before executing it.
    #[arg(long)]
    trace: bool,
}


fn run(args: &Args) -> Result<bool, VmError> {
    let mut vm = Vm::initialize(VmConfig::default().with_mem_words(args.mem_words))?;
    vm.load_file(&args.exe)?;

    let main = vm.resolve_label(ENTRY_POINT)?;
    info!("{ENTRY_POINT} is at {main:#x}");

    let Some(sps) = spaced_stack_pointers(args.mem_words, args.processors, args.stack_size)
    else {
        eprintln!(
            "ERROR: {} stacks of {} words don't fit in {} words of memory",
            args.processors, args.stack_size, args.mem_words
        );
        return Ok(false);
    };

    let report = vm.run(args.processors, &sps, args.trace)?;
    for (id, p) in report.processors.iter().enumerate() {
        println!("Processor {id}: {}", p.status);
    }

    let ok = report.succeeded();
    vm.teardown();
    Ok(ok)
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}
