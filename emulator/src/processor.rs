use std::fmt;

use common::asm::*;
use common::mem::Word;

use crate::memory::Memory;
use crate::registers::Registers;
use crate::trace::Tracer;

use derive_more::IsVariant;
use log::{debug, trace};

/// How a processor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant)]
pub enum Status {
    NormalTermination,
    AddressOutOfRange,
    DivideByZero,
    IllegalInstruction,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let desc = match self {
            Status::NormalTermination => "normal termination",
            Status::AddressOutOfRange => "address out of range",
            Status::DivideByZero => "divide by zero",
            Status::IllegalInstruction => "illegal instruction",
        };
        write!(f, "{desc}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecRet {
    Ok,
    Halt,
}

// A fault ends the processor with that status.
type Exec<T = ()> = Result<T, Status>;


pub struct Processor<'a> {
    id: Word,
    count: Word,
    regs: Registers,
    mem: &'a Memory,
    code_words: Word,
    tracer: Option<&'a Tracer>,
}

impl<'a> Processor<'a> {
    pub fn new(
        id: Word,
        count: Word,
        initial_sp: Word,
        mem: &'a Memory,
        code_words: Word,
        tracer: Option<&'a Tracer>,
    ) -> Processor<'a> {
        let mut regs = Registers::new();
        regs.set(Reg::FP, 0);
        regs.set(Reg::SP, initial_sp);
        regs.set(Reg::PC, 0);
        Processor { id, count, regs, mem, code_words, tracer }
    }

    // Run until a halt, a fault, or the pc leaves the code.
    pub fn run(mut self) -> (Status, Registers) {
        debug!("Processor {}: starting, sp {:#x}", self.id, self.regs.get(Reg::SP));
        let status = loop {
            if self.regs.pc() >= self.code_words {
                break Status::NormalTermination;
            }
            match self.run_ins() {
                Ok(ExecRet::Ok) => {}
                Ok(ExecRet::Halt) => break Status::NormalTermination,
                Err(fault) => break fault,
            }
        };
        debug!("Processor {}: {status} at pc {:#x}", self.id, self.regs.pc());
        (status, self.regs)
    }

    fn run_ins(&mut self) -> Exec<ExecRet> {
        let addr = self.regs.pc();
        let word = self.read(addr)?;
        self.regs.set(Reg::PC, addr + 1);

        if let Some(tracer) = self.tracer {
            tracer.trace(self.id, addr, word, &self.regs);
        }

        let Some(ins) = Ins::decode(word) else {
            return Err(Status::IllegalInstruction);
        };
        trace!("<{}> {addr:#x}: {}", self.id, ins.display_at(addr));

        self.exec(&ins)
    }

    ///////////////////////////////////////////////////////////////////////////
    // Helpers
    ///////////////////////////////////////////////////////////////////////////

    fn read(&self, addr: Word) -> Exec<Word> {
        self.mem.get(addr).ok_or(Status::AddressOutOfRange)
    }

    fn write(&self, addr: Word, val: Word) -> Exec {
        self.mem.set(addr, val).ok_or(Status::AddressOutOfRange)
    }

    // Relative to the pc, which already points past this instruction. The
    // end of the code is itself a valid target.
    fn target(&self, disp: i32) -> Exec<Word> {
        let target = i64::from(self.regs.pc()) + i64::from(disp);
        if target < 0 || target > i64::from(self.code_words) {
            return Err(Status::AddressOutOfRange);
        }
        Ok(target as Word)
    }

    fn push(&mut self, val: Word) -> Exec {
        let sp = self.regs.get(Reg::SP).wrapping_sub(1);
        self.regs.set(Reg::SP, sp);
        self.write(sp, val)
    }

    ///////////////////////////////////////////////////////////////////////////
    // Execute
    ///////////////////////////////////////////////////////////////////////////

    fn exec(&mut self, ins: &Ins) -> Exec<ExecRet> {
        match ins.operands {
            Operands::RegAddr { reg, addr } => self.exec_reg_addr(ins.op, reg, addr)?,
            Operands::Jump { addr } => self.exec_jump(ins.op, addr)?,
            Operands::RegRegOffset { reg1, reg2, offset } => {
                self.exec_indirect(ins.op, reg1, reg2, offset)?
            }
            Operands::RegReg { reg1, reg2 } => self.exec_arith(ins.op, reg1, reg2)?,
            Operands::RegRegAddr { reg1, reg2, addr } => {
                self.exec_reg_reg_addr(ins.op, reg1, reg2, addr)?
            }
            Operands::SingleReg { reg } => self.exec_single_reg(ins.op, reg)?,
            Operands::None => return self.exec_no_operand(ins.op),
        }
        Ok(ExecRet::Ok)
    }

    fn exec_no_operand(&mut self, op: Opcode) -> Exec<ExecRet> {
        match op {
            Opcode::Halt => return Ok(ExecRet::Halt),
            Opcode::Ret => self.exec_ret()?,
            _ => unreachable!("{op} has operands"),
        }
        Ok(ExecRet::Ok)
    }

    fn exec_reg_addr(&mut self, op: Opcode, reg: Reg, addr: i32) -> Exec {
        match op {
            Opcode::Load => {
                let target = self.target(addr)?;
                let val = {
                    let _data = self.mem.lock();
                    self.read(target)?
                };
                self.regs.set(reg, val);
            }
            Opcode::Store => {
                let target = self.target(addr)?;
                let _data = self.mem.lock();
                self.write(target, self.regs.get(reg))?;
            }
            Opcode::Ldimm => self.regs.set(reg, addr as Word),
            Opcode::Ldaddr => {
                let target = self.target(addr)?;
                self.regs.set(reg, target);
            }
            _ => unreachable!("{op} isn't a register/address instruction"),
        }
        Ok(())
    }

    // No check against the code size here, only against the memory itself.
    fn exec_indirect(&mut self, op: Opcode, reg1: Reg, reg2: Reg, offset: i32) -> Exec {
        let addr = self.regs.get(reg2).wrapping_add(offset as Word);
        match op {
            Opcode::Ldind => {
                let val = {
                    let _data = self.mem.lock();
                    self.read(addr)?
                };
                self.regs.set(reg1, val);
            }
            Opcode::Stind => {
                let _data = self.mem.lock();
                self.write(addr, self.regs.get(reg1))?;
            }
            _ => unreachable!("{op} isn't an indirect instruction"),
        }
        Ok(())
    }

    fn exec_arith(&mut self, op: Opcode, reg1: Reg, reg2: Reg) -> Exec {
        let lhs = self.regs.get(reg1);
        let rhs = self.regs.get(reg2);
        let float = |f: fn(f32, f32) -> f32| f(f32::from_bits(lhs), f32::from_bits(rhs)).to_bits();

        let res = match op {
            Opcode::Addf => float(|a, b| a + b),
            Opcode::Subf => float(|a, b| a - b),
            Opcode::Mulf => float(|a, b| a * b),
            Opcode::Divf => {
                if f32::from_bits(rhs) == 0.0 {
                    return Err(Status::DivideByZero);
                }
                float(|a, b| a / b)
            }
            Opcode::Addi => lhs.wrapping_add(rhs),
            Opcode::Subi => lhs.wrapping_sub(rhs),
            Opcode::Muli => lhs.wrapping_mul(rhs),
            Opcode::Divi => {
                if rhs == 0 {
                    return Err(Status::DivideByZero);
                }
                (lhs as i32).wrapping_div(rhs as i32) as Word
            }
            _ => unreachable!("{op} isn't an arithmetic instruction"),
        };
        self.regs.set(reg1, res);
        Ok(())
    }

    fn exec_jump(&mut self, op: Opcode, addr: i32) -> Exec {
        let target = self.target(addr)?;
        match op {
            Opcode::Call => {
                let ret = self.regs.pc();
                let fp = self.regs.get(Reg::FP);
                self.push(ret)?;
                self.push(fp)?;
                self.regs.set(Reg::FP, self.regs.get(Reg::SP));
                // Reserved slot, copied back to the caller's frame on return.
                self.push(0)?;
                trace!("<{}> call {target:#x}, frame {:#x}", self.id, self.regs.get(Reg::FP));
            }
            Opcode::Jmp => {}
            _ => unreachable!("{op} isn't a jump instruction"),
        }
        self.regs.set(Reg::PC, target);
        Ok(())
    }

    fn exec_ret(&mut self) -> Exec {
        let sp = self.regs.get(Reg::SP);
        let slot = self.read(sp)?;
        let fp = self.read(sp.wrapping_add(1))?;
        let pc = self.read(sp.wrapping_add(2))?;

        self.regs.set(Reg::FP, fp);
        self.regs.set(Reg::PC, pc);
        self.regs.set(Reg::SP, sp.wrapping_add(3));

        // A frame link of 0 is the root frame, which has no slot below it.
        if fp != 0 {
            self.write(fp - 1, slot)?;
        }
        Ok(())
    }

    fn exec_reg_reg_addr(&mut self, op: Opcode, reg1: Reg, reg2: Reg, addr: i32) -> Exec {
        let target = self.target(addr)?;
        let lhs = self.regs.get(reg1);
        let rhs = self.regs.get(reg2);

        let taken = match op {
            Opcode::Blt => (lhs as i32) < (rhs as i32),
            Opcode::Bgt => (lhs as i32) > (rhs as i32),
            Opcode::Beq => lhs == rhs,
            Opcode::Cmpxchg => {
                let _data = self.mem.lock();
                let cur = self.read(target)?;
                if cur == lhs {
                    self.write(target, rhs)?;
                } else {
                    self.regs.set(reg1, cur);
                }
                false
            }
            _ => unreachable!("{op} isn't a compare instruction"),
        };

        if taken {
            self.regs.set(Reg::PC, target);
        }
        Ok(())
    }

    fn exec_single_reg(&mut self, op: Opcode, reg: Reg) -> Exec {
        match op {
            Opcode::Getpid => self.regs.set(reg, self.id),
            Opcode::Getpn => self.regs.set(reg, self.count),
            Opcode::Push => {
                let sp = self.regs.get(Reg::SP).wrapping_sub(1);
                self.regs.set(Reg::SP, sp);
                // Pushing sp pushes the decremented value.
                self.write(sp, self.regs.get(reg))?;
            }
            Opcode::Pop => {
                let val = self.read(self.regs.get(Reg::SP))?;
                self.regs.set(reg, val);
                // Popping into sp then bumps the popped value.
                let sp = self.regs.get(Reg::SP).wrapping_add(1);
                self.regs.set(Reg::SP, sp);
            }
            _ => unreachable!("{op} isn't a single register instruction"),
        }
        Ok(())
    }
}
