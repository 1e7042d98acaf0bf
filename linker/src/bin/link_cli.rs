use std::path::PathBuf;
use std::process::ExitCode;

use link_lib::{link_files, output_path};
use objfile::write_executable_file;

use clap::Parser;
use log::info;

/// VMX20 Linker
#[derive(Parser)]
#[command(about)]
struct Args {
    /// Object modules to link, in order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Executable name; defaults to the first input's name
    #[arg(long, short)]
    output: Option<String>,
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    let outname = output_path(&args.inputs[0], args.output.as_deref());

    // Nothing is written unless the whole link succeeds.
    let res = link_files(&args.inputs[..])
        .map_err(|e| e.to_string())
        .and_then(|exe| write_executable_file(&outname, &exe).map_err(|e| e.to_string()));

    match res {
        Ok(()) => {
            info!("Wrote {}", outname.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}
