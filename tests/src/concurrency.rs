use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use common::asm::{Ins, Opcode::*, Reg::*};
use emu_lib::Status;

use crate::{MEM_WORDS, run, vm_for};

#[test]
fn cmpxchg_one_winner() {
    let vm = vm_for(vec![
        Ins::single_reg(Getpid, R2).encode(),
        Ins::reg_addr(Ldimm, R3, 1).encode(),
        Ins::reg_reg(Addi, R2, R3).encode(),
        Ins::reg_reg_addr(Cmpxchg, R1, R2, 1).encode(),
        Ins::no_operand(Halt).encode(),
        // lock:
        0,
    ]);
    let report = run(&vm, 2);
    assert!(report.succeeded());

    let r1: Vec<_> = report.processors.iter().map(|p| p.regs.get(R1)).collect();
    let winner = r1.iter().position(|v| *v == 0).unwrap();
    let loser = 1 - winner;
    // The loser sees what the winner swapped in.
    assert_eq!(r1[loser], winner as u32 + 1);
    assert_eq!(vm.read_word(5).unwrap(), winner as u32 + 1);
}

#[test]
fn spin_lock_counter() {
    const PROCESSORS: usize = 4;
    const ROUNDS: i32 = 200;

    let vm = vm_for(vec![
        Ins::reg_addr(Ldimm, R5, ROUNDS).encode(),
        Ins::reg_addr(Ldimm, R6, 1).encode(),
        // acquire:
        Ins::reg_addr(Ldimm, R1, 0).encode(),
        Ins::reg_reg_addr(Cmpxchg, R1, R6, 9).encode(),
        Ins::reg_reg_addr(Beq, R1, R0, 1).encode(),
        Ins::jump(Jmp, -4).encode(),
        // critical:
        Ins::reg_addr(Load, R2, 7).encode(),
        Ins::reg_reg(Addi, R2, R6).encode(),
        Ins::reg_addr(Store, R2, 5).encode(),
        Ins::reg_addr(Store, R0, 3).encode(),
        Ins::reg_reg(Subi, R5, R6).encode(),
        Ins::reg_reg_addr(Bgt, R5, R0, -10).encode(),
        Ins::no_operand(Halt).encode(),
        // lock:
        0,
        // counter:
        0,
    ]);
    let report = run(&vm, PROCESSORS);
    assert!(report.succeeded());
    assert_eq!(vm.read_word(13).unwrap(), 0);
    assert_eq!(vm.read_word(14).unwrap(), PROCESSORS as u32 * ROUNDS as u32);
}

#[test]
fn independent_stacks() {
    // Each processor pushes its id and pops it back through another register.
    let vm = vm_for(vec![
        Ins::single_reg(Getpid, R1).encode(),
        Ins::jump(Call, 1).encode(),
        Ins::no_operand(Halt).encode(),
        Ins::single_reg(Push, R1).encode(),
        Ins::single_reg(Pop, R2).encode(),
        Ins::no_operand(Ret).encode(),
    ]);
    let report = run(&vm, 3);
    for (id, p) in report.processors.iter().enumerate() {
        assert_eq!(p.status, Status::NormalTermination);
        assert_eq!(p.regs.get(R2), id as u32);
        assert_eq!(p.regs.get(SP) as usize, MEM_WORDS - id * 256);
    }
}

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn trace_entries_dont_interleave() {
    let mut vm = vm_for(vec![
        Ins::reg_addr(Ldimm, R1, 3).encode(),
        Ins::reg_addr(Ldimm, R2, 1).encode(),
        Ins::reg_reg(Subi, R1, R2).encode(),
        Ins::reg_reg_addr(Bgt, R1, R0, -2).encode(),
    ]);
    let buf = SharedBuf::default();
    vm.set_trace_output(buf.clone());

    let sps = emu_lib::spaced_stack_pointers(MEM_WORDS, 3, 256).unwrap();
    let report = vm.run(3, &sps, true).unwrap();
    assert!(report.succeeded());

    let out = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
    let lines: Vec<_> = out.lines().collect();
    // 2 + 3 * 2 instructions per processor, 3 lines each.
    assert_eq!(lines.len(), 3 * 8 * 3);
    for entry in lines.chunks(3) {
        assert!(entry[0].starts_with('<'), "{entry:?}");
        for regs in &entry[1..] {
            assert_eq!(regs.split(' ').count(), 8, "{entry:?}");
            assert!(regs.split(' ').all(|r| r.len() == 8));
        }
    }
    for pid in 0..3 {
        let prefix = format!("<{pid}> ");
        assert_eq!(lines.iter().filter(|l| l.starts_with(&prefix)).count(), 8);
    }
}
