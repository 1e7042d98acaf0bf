use std::fs;
use std::path::{Path, PathBuf};

use common::asm::{Ins, Opcode::*, Reg::*};
use emu_lib::{Vm, VmConfig, VmError};
use link_lib::{LinkError, link_files, output_path};
use objfile::{FormatError, Module, Symbol, read_executable_file, write_executable_file};
use tempfile::tempdir;

fn write_modules(dir: &Path) -> Vec<PathBuf> {
    let main = Module {
        insymbols: vec![Symbol::new("mainx20", 0).unwrap()],
        outsymbols: vec![Symbol::new("seven", 0).unwrap()],
        code: vec![Ins::jump(Call, 0).encode(), Ins::no_operand(Halt).encode()],
    };
    let lib = Module {
        insymbols: vec![Symbol::new("seven", 0).unwrap()],
        outsymbols: vec![],
        code: vec![Ins::reg_addr(Ldimm, R1, 7).encode(), Ins::no_operand(Ret).encode()],
    };

    let paths = vec![dir.join("main.obj"), dir.join("lib.obj")];
    fs::write(&paths[0], main.to_bytes()).unwrap();
    fs::write(&paths[1], lib.to_bytes()).unwrap();
    paths
}

#[test]
fn link_write_load_run() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path();
    let inputs = write_modules(dir);

    let exe = link_files(&inputs[..]).unwrap();
    let out = output_path(&inputs[0], None);
    assert_eq!(out, dir.join("main.exe"));
    write_executable_file(&out, &exe).unwrap();
    assert_eq!(read_executable_file(&out).unwrap(), exe);

    let mut vm = Vm::initialize(VmConfig::default().with_mem_words(256)).unwrap();
    vm.load_file(&out).unwrap();
    assert_eq!(vm.resolve_label("seven").unwrap(), 2);
    let report = vm.run(1, &[256], false).unwrap();
    assert!(report.succeeded());
    assert_eq!(report.processors[0].regs.get(R1), 7);
    vm.teardown();
}

#[test]
fn suffixes_are_checked() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path();
    let inputs = write_modules(dir);

    // A module where an executable is expected, and the other way round.
    let mut vm = Vm::initialize(VmConfig::default().with_mem_words(256)).unwrap();
    assert!(matches!(
        vm.load_file(&inputs[0]),
        Err(VmError::Format(FormatError::InvalidFormat(_)))
    ));

    let renamed = dir.join("lib.exe");
    fs::copy(&inputs[1], &renamed).unwrap();
    assert!(matches!(
        link_files(&[&inputs[0], &renamed]),
        Err(LinkError::Format(FormatError::InvalidFormat(_)))
    ));
}

#[test]
fn missing_file() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path();
    assert!(matches!(
        link_files(&[dir.join("nope.obj")]),
        Err(LinkError::Format(FormatError::FileNotFound { .. }))
    ));

    let mut vm = Vm::initialize(VmConfig::default().with_mem_words(16)).unwrap();
    assert!(matches!(
        vm.load_file(dir.join("nope.exe")),
        Err(VmError::Format(FormatError::FileNotFound { .. }))
    ));
}
