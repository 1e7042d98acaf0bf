use std::fmt;

use common::asm::{NUM_REGS, Reg};
use common::mem::Word;

use log::trace;

/// One processor's private register file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registers([Word; NUM_REGS]);

impl Registers {
    pub fn new() -> Registers {
        Default::default()
    }

    pub fn get(&self, reg: Reg) -> Word {
        self.0[reg.index()]
    }

    pub fn set(&mut self, reg: Reg, val: Word) {
        trace!("Reg: writing {val:#010x} to {reg}");
        self.0[reg.index()] = val;
    }

    pub fn pc(&self) -> Word {
        self.get(Reg::PC)
    }

    pub fn as_array(&self) -> &[Word; NUM_REGS] {
        &self.0
    }
}

// Two rows of eight, as the tracer prints them.
impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for row in self.0.chunks(NUM_REGS / 2) {
            let row: Vec<String> = row.iter().map(|r| format!("{r:08x}")).collect();
            writeln!(f, "{}", row.join(" "))?;
        }
        Ok(())
    }
}
