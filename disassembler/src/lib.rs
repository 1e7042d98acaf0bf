use std::fmt;

use common::asm::Ins;
use common::mem::{ToWordP, Word};

pub struct Disassembled {
    pub addr: Word,
    pub word: Word,
    pub ins: Option<Ins>,
}

impl Disassembled {
    pub fn is_zero(&self) -> bool {
        self.word == 0
    }
}

impl fmt::Display for Disassembled {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:08x}: {:08x}", self.addr, self.word)?;
        match &self.ins {
            Some(ins) => write!(f, "\t{}", ins.display_at(self.addr)),
            None => write!(f, "\t.word\t{:#010x}", self.word),
        }
    }
}

// Every word is one instruction, so unlike a variable length encoding there's
// never any resynchronizing to do.
pub fn disassemble(code: &[Word]) -> Vec<Disassembled> {
    code.iter()
        .enumerate()
        .map(|(i, &word)| Disassembled {
            addr: i.to_word_p(),
            word,
            ins: Ins::decode(word),
        })
        .collect()
}

/// Zero runs longer than this are cut down to their first and last word.
pub const ZERO_RUN_THRESH: usize = 8;

/// Drops the middle of every long run of zero words. The addresses left
/// behind jump across the gap, which is what a listing marks with "...".
pub fn elide_zero_runs(disassembly: Vec<Disassembled>) -> Vec<Disassembled> {
    let mut out = Vec::with_capacity(disassembly.len());
    let mut run: Vec<Disassembled> = vec![];

    let flush = |run: &mut Vec<Disassembled>, out: &mut Vec<Disassembled>| {
        if run.len() > ZERO_RUN_THRESH {
            let last = run.pop();
            out.extend(run.drain(..).take(1));
            out.extend(last);
        } else {
            out.append(run);
        }
    };

    for dis in disassembly {
        if dis.is_zero() {
            run.push(dis);
        } else {
            flush(&mut run, &mut out);
            out.push(dis);
        }
    }
    flush(&mut run, &mut out);
    out
}
