#![cfg(test)]

mod concurrency;
mod files;
mod linking;
mod progs;

use common::mem::Word;
use emu_lib::{RunReport, Vm, VmConfig};
use objfile::{Executable, Symbol};

const MEM_WORDS: usize = 4096;

fn vm_for(code: Vec<Word>) -> Vm {
    let mut vm = Vm::initialize(VmConfig::default().with_mem_words(MEM_WORDS)).unwrap();
    let symbols = vec![Symbol::new("mainx20", 0).unwrap()];
    vm.load_executable(Executable { symbols, code }).unwrap();
    vm
}

fn run(vm: &Vm, processors: usize) -> RunReport {
    let sps = emu_lib::spaced_stack_pointers(MEM_WORDS, processors, 256).unwrap();
    vm.run(processors, &sps, false).unwrap()
}
