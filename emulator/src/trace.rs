use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use common::asm::Ins;
use common::mem::Word;

use crate::registers::Registers;

use log::warn;

/// Where `--trace` output goes. Holding the lock for a whole entry keeps
/// processors from interleaving their lines.
pub struct Tracer {
    out: Mutex<Box<dyn Write + Send>>,
}

impl Tracer {
    pub fn new(out: impl Write + Send + 'static) -> Tracer {
        Tracer { out: Mutex::new(Box::new(out)) }
    }

    pub fn stdout() -> Tracer {
        Self::new(io::stdout())
    }

    pub fn set_output(&mut self, out: impl Write + Send + 'static) {
        *self.out.get_mut().unwrap_or_else(PoisonError::into_inner) = Box::new(out);
    }

    /// `addr` is the instruction being executed; `regs` already has the pc
    /// moved past it.
    pub fn trace(&self, pid: Word, addr: Word, word: Word, regs: &Registers) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let res = match Ins::decode(word) {
            Some(ins) => writeln!(out, "<{pid}> {addr:08x}: {}", ins.display_at(addr)),
            None => writeln!(out, "<{pid}> {addr:08x}: .word\t{word:#010x}"),
        }
        .and_then(|_| write!(out, "{regs}"))
        .and_then(|_| out.flush());

        if let Err(e) = res {
            warn!("Trace output failed: {e}");
        }
    }
}
