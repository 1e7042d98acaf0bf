use super::asm::*;
use super::mem::{Word, sign_extend};

use num_traits::FromPrimitive;

/// Maps the low byte of an instruction word to its operand layout.
pub fn classify(opcode: Word) -> AddrMode {
    Opcode::from_u32(opcode).map_or(AddrMode::Illegal, Opcode::addr_mode)
}

fn reg1(word: Word) -> Reg {
    Reg::from_field(word, AddrMode::REG1_SHIFT)
}

fn reg2(word: Word) -> Reg {
    Reg::from_field(word, AddrMode::REG2_SHIFT)
}

fn offset16(word: Word) -> i32 {
    sign_extend(word >> 16, 16)
}

/// Pulls the operand fields for `mode` out of `word`. Returns None for
/// Illegal.
pub fn decode(word: Word, mode: AddrMode) -> Option<Operands> {
    Some(match mode {
        AddrMode::RegAddr20 => Operands::RegAddr {
            reg: reg1(word),
            addr: AddrField::Wide20.extract(word),
        },
        AddrMode::JumpAddr20 => Operands::Jump {
            addr: AddrField::Wide20.extract(word),
        },
        AddrMode::RegRegOffset16 => Operands::RegRegOffset {
            reg1: reg1(word),
            reg2: reg2(word),
            offset: offset16(word),
        },
        AddrMode::RegReg => Operands::RegReg {
            reg1: reg1(word),
            reg2: reg2(word),
        },
        AddrMode::RegRegAddr16 => Operands::RegRegAddr {
            reg1: reg1(word),
            reg2: reg2(word),
            addr: AddrField::Narrow16.extract(word),
        },
        AddrMode::SingleReg => Operands::SingleReg { reg: reg1(word) },
        AddrMode::NoOperand => Operands::None,
        AddrMode::Illegal => return None,
    })
}
