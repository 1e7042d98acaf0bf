use common::asm::{Ins, Opcode::*, Reg::*};
use emu_lib::Status;

use crate::{MEM_WORDS, run, vm_for};

#[test]
fn sum_loop() {
    let vm = vm_for(vec![
        Ins::reg_addr(Ldimm, R1, 10).encode(),
        Ins::reg_addr(Ldimm, R2, 0).encode(),
        Ins::reg_addr(Ldimm, R3, 1).encode(),
        // loop:
        Ins::reg_reg(Addi, R2, R1).encode(),
        Ins::reg_reg(Subi, R1, R3).encode(),
        Ins::reg_reg_addr(Bgt, R1, R0, -3).encode(),
        Ins::no_operand(Halt).encode(),
    ]);
    let report = run(&vm, 1);
    assert!(report.succeeded());
    assert_eq!(report.processors[0].regs.get(R2), 55);
    assert_eq!(report.processors[0].regs.get(R1), 0);
}

#[test]
fn recursive_factorial() {
    let vm = vm_for(vec![
        Ins::reg_addr(Ldimm, R6, 1).encode(),
        Ins::reg_addr(Ldimm, R1, 5).encode(),
        Ins::jump(Call, 1).encode(),
        Ins::no_operand(Halt).encode(),
        // fact: (r1) -> r2
        Ins::reg_reg_addr(Beq, R1, R0, 6).encode(),
        Ins::single_reg(Push, R1).encode(),
        Ins::reg_reg(Subi, R1, R6).encode(),
        Ins::jump(Call, -4).encode(),
        Ins::single_reg(Pop, R1).encode(),
        Ins::reg_reg(Muli, R2, R1).encode(),
        Ins::no_operand(Ret).encode(),
        // base:
        Ins::reg_addr(Ldimm, R2, 1).encode(),
        Ins::no_operand(Ret).encode(),
    ]);
    let report = run(&vm, 1);
    let p = &report.processors[0];
    assert_eq!(p.status, Status::NormalTermination);
    assert_eq!(p.regs.get(R2), 120);
    assert_eq!(p.regs.get(SP), MEM_WORDS as u32);
    assert_eq!(p.regs.get(FP), 0);
    assert_eq!(p.regs.pc(), 4);
}

#[test]
fn self_modifying_store() {
    // Overwrites the halt at 2 with ldimm r4, 3 before reaching it.
    let vm = vm_for(vec![
        Ins::reg_addr(Load, R1, 2).encode(),
        Ins::reg_addr(Store, R1, 0).encode(),
        Ins::no_operand(Halt).encode(),
        Ins::reg_addr(Ldimm, R4, 3).encode(),
    ]);
    let report = run(&vm, 1);
    assert!(report.succeeded());
    assert_eq!(report.processors[0].regs.get(R4), 3);
}

#[test]
fn faults_stop_only_that_processor() {
    // Processor 1 divides by zero, processor 0 runs to the end.
    let vm = vm_for(vec![
        Ins::single_reg(Getpid, R1).encode(),
        Ins::reg_reg_addr(Beq, R1, R0, 1).encode(),
        Ins::reg_reg(Divi, R1, R0).encode(),
        Ins::reg_addr(Ldimm, R2, 9).encode(),
    ]);
    let report = run(&vm, 2);
    assert_eq!(report.statuses(), vec![Status::NormalTermination, Status::DivideByZero]);
    assert_eq!(report.processors[0].regs.get(R2), 9);
    assert_eq!(report.processors[1].regs.get(R2), 0);
    assert!(!report.succeeded());
}

#[test]
fn mixed_float_int() {
    let vm = vm_for(vec![
        Ins::reg_addr(Load, R1, 4).encode(),
        Ins::reg_addr(Load, R2, 4).encode(),
        Ins::reg_reg(Subf, R1, R2).encode(),
        Ins::reg_reg(Addf, R1, R2).encode(),
        Ins::no_operand(Halt).encode(),
        2.5f32.to_bits(),
        0.25f32.to_bits(),
    ]);
    let report = run(&vm, 1);
    assert_eq!(f32::from_bits(report.processors[0].regs.get(R1)), 2.5);
}
