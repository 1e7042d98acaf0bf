use crate::mem::{Word, sign_extend};

use std::fmt;

use derive_more::IsVariant;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;


#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive, PartialEq, Eq, Hash)]
pub enum Opcode {
    Halt = 0,
    Load,
    Store,
    Ldimm,
    Ldaddr,
    Ldind,
    Stind,
    Addf,
    Subf,
    Divf,
    Mulf,
    Addi,
    Subi,
    Divi,
    Muli,
    Call,
    Ret,
    Blt,
    Bgt,
    Beq,
    Jmp,
    Cmpxchg,
    Getpid,
    Getpn,
    Push,
    Pop,
}

impl Opcode {
    pub const NUM_BITS: u32 = 8;
    pub const MASK: Word = (1 << Self::NUM_BITS) - 1;

    /// The opcode held in the low byte of an instruction word, if legal.
    pub fn of(word: Word) -> Option<Opcode> {
        Opcode::from_u32(word & Self::MASK)
    }

    pub fn addr_mode(self) -> AddrMode {
        use Opcode::*;
        match self {
            Load | Store | Ldimm | Ldaddr => AddrMode::RegAddr20,
            Call | Jmp => AddrMode::JumpAddr20,
            Ldind | Stind => AddrMode::RegRegOffset16,
            Addf | Subf | Divf | Mulf | Addi | Subi | Divi | Muli => AddrMode::RegReg,
            Blt | Bgt | Beq | Cmpxchg => AddrMode::RegRegAddr16,
            Getpid | Getpn | Push | Pop => AddrMode::SingleReg,
            Halt | Ret => AddrMode::NoOperand,
        }
    }

    // ldimm shares the 20-bit field layout, but its field is a constant.
    pub fn is_pc_relative(self) -> bool {
        self != Opcode::Ldimm && self.addr_mode().addr_field().is_some()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", format!("{:?}", self).to_lowercase())
    }
}


////////////////////////////////////////////////////////////////////////////////


#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive, PartialEq, Eq, Hash)]
pub enum Reg {
    R0 = 0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    R11,
    R12,
    FP, // r13, frame link
    SP, // r14, grows down, pre-decremented
    PC, // r15, index of the next instruction
}

pub const NUM_REGS: usize = 16;

impl Reg {
    pub const NUM_BITS: u32 = 4;
    pub const MASK: Word = (1 << Self::NUM_BITS) - 1;

    const ALL: [Reg; NUM_REGS] = {
        use Reg::*;
        [R0, R1, R2, R3, R4, R5, R6, R7, R8, R9, R10, R11, R12, FP, SP, PC]
    };

    /// The register named by the 4-bit field starting at `shift`.
    pub fn from_field(word: Word, shift: u32) -> Reg {
        Self::ALL[((word >> shift) & Self::MASK) as usize]
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "r{}", self.index())
    }
}


////////////////////////////////////////////////////////////////////////////////


#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant)]
pub enum AddrMode {
    RegAddr20,
    JumpAddr20,
    RegRegOffset16,
    RegReg,
    RegRegAddr16,
    SingleReg,
    NoOperand,
    Illegal,
}

impl AddrMode {
    pub const REG1_SHIFT: u32 = 8;
    pub const REG2_SHIFT: u32 = 12;

    /// The field holding a self-relative address, the one the linker patches.
    pub fn addr_field(self) -> Option<AddrField> {
        match self {
            AddrMode::RegAddr20 | AddrMode::JumpAddr20 => Some(AddrField::Wide20),
            AddrMode::RegRegAddr16 => Some(AddrField::Narrow16),
            _ => None,
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrField {
    Wide20,   // Bits 12-31
    Narrow16, // Bits 16-31
}

impl AddrField {
    pub fn shift(self) -> u32 {
        match self {
            AddrField::Wide20 => 12,
            AddrField::Narrow16 => 16,
        }
    }

    pub fn bits(self) -> u32 {
        Word::BITS - self.shift()
    }

    fn mask(self) -> Word {
        Word::MAX << self.shift()
    }

    pub fn min(self) -> i32 {
        -(1 << (self.bits() - 1))
    }

    pub fn max(self) -> i32 {
        (1 << (self.bits() - 1)) - 1
    }

    pub fn extract(self, word: Word) -> i32 {
        sign_extend(word >> self.shift(), self.bits())
    }

    /// Overwrites the field, or returns None if `val` doesn't fit.
    pub fn insert(self, word: Word, val: i32) -> Option<Word> {
        if val < self.min() || val > self.max() {
            return None;
        }
        Some(self.insert_truncating(word, val))
    }

    fn insert_truncating(self, word: Word, val: i32) -> Word {
        (word & !self.mask()) | (((val as Word) << self.shift()) & self.mask())
    }
}


////////////////////////////////////////////////////////////////////////////////


#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant)]
pub enum Operands {
    RegAddr { reg: Reg, addr: i32 },
    Jump { addr: i32 },
    RegRegOffset { reg1: Reg, reg2: Reg, offset: i32 },
    RegReg { reg1: Reg, reg2: Reg },
    RegRegAddr { reg1: Reg, reg2: Reg, addr: i32 },
    SingleReg { reg: Reg },
    None,
}

impl Operands {
    pub fn mode(&self) -> AddrMode {
        match self {
            Operands::RegAddr { .. } => AddrMode::RegAddr20,
            Operands::Jump { .. } => AddrMode::JumpAddr20,
            Operands::RegRegOffset { .. } => AddrMode::RegRegOffset16,
            Operands::RegReg { .. } => AddrMode::RegReg,
            Operands::RegRegAddr { .. } => AddrMode::RegRegAddr16,
            Operands::SingleReg { .. } => AddrMode::SingleReg,
            Operands::None => AddrMode::NoOperand,
        }
    }

    /// The self-relative displacement, for modes that carry one.
    pub fn addr(&self) -> Option<i32> {
        match *self {
            Operands::RegAddr { addr, .. }
            | Operands::Jump { addr }
            | Operands::RegRegAddr { addr, .. } => Some(addr),
            _ => None,
        }
    }

    fn encode(&self) -> Word {
        let reg1 = |r: Reg| (r.index() as Word) << AddrMode::REG1_SHIFT;
        let reg2 = |r: Reg| (r.index() as Word) << AddrMode::REG2_SHIFT;
        match *self {
            Operands::RegAddr { reg, addr } => AddrField::Wide20.insert_truncating(reg1(reg), addr),
            Operands::Jump { addr } => AddrField::Wide20.insert_truncating(0, addr),
            Operands::RegRegOffset { reg1: r1, reg2: r2, offset } => {
                AddrField::Narrow16.insert_truncating(reg1(r1) | reg2(r2), offset)
            }
            Operands::RegReg { reg1: r1, reg2: r2 } => reg1(r1) | reg2(r2),
            Operands::RegRegAddr { reg1: r1, reg2: r2, addr } => {
                AddrField::Narrow16.insert_truncating(reg1(r1) | reg2(r2), addr)
            }
            Operands::SingleReg { reg } => reg1(reg),
            Operands::None => 0,
        }
    }
}


////////////////////////////////////////////////////////////////////////////////


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ins {
    pub op: Opcode,
    pub operands: Operands,
}

impl Ins {
    pub fn new(op: Opcode, operands: Operands) -> Ins {
        assert_eq!(op.addr_mode(), operands.mode(), "Operands don't fit {op}");
        Ins { op, operands }
    }

    pub fn reg_addr(op: Opcode, reg: Reg, addr: i32) -> Ins {
        Ins::new(op, Operands::RegAddr { reg, addr })
    }

    pub fn jump(op: Opcode, addr: i32) -> Ins {
        Ins::new(op, Operands::Jump { addr })
    }

    pub fn reg_reg_offset(op: Opcode, reg1: Reg, reg2: Reg, offset: i32) -> Ins {
        Ins::new(op, Operands::RegRegOffset { reg1, reg2, offset })
    }

    pub fn reg_reg(op: Opcode, reg1: Reg, reg2: Reg) -> Ins {
        Ins::new(op, Operands::RegReg { reg1, reg2 })
    }

    pub fn reg_reg_addr(op: Opcode, reg1: Reg, reg2: Reg, addr: i32) -> Ins {
        Ins::new(op, Operands::RegRegAddr { reg1, reg2, addr })
    }

    pub fn single_reg(op: Opcode, reg: Reg) -> Ins {
        Ins::new(op, Operands::SingleReg { reg })
    }

    pub fn no_operand(op: Opcode) -> Ins {
        Ins::new(op, Operands::None)
    }

    /// Fields wider than their slot are truncated, as an assembler would.
    pub fn encode(&self) -> Word {
        self.op as Word | self.operands.encode()
    }

    pub fn decode(word: Word) -> Option<Ins> {
        let op = Opcode::of(word)?;
        let operands = crate::decoder::decode(word, op.addr_mode())?;
        Some(Ins { op, operands })
    }

    pub fn display_at(&self, addr: Word) -> InsAt {
        InsAt(self, addr)
    }
}

impl fmt::Display for Ins {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.operands {
            Operands::RegAddr { reg, addr } => write!(f, "{}\t{}, {}", self.op, reg, addr),
            Operands::Jump { addr } => write!(f, "{}\t{}", self.op, addr),
            Operands::RegRegOffset { reg1, reg2, offset } => {
                write!(f, "{}\t{}, {}({})", self.op, reg1, offset, reg2)
            }
            Operands::RegReg { reg1, reg2 } => write!(f, "{}\t{}, {}", self.op, reg1, reg2),
            Operands::RegRegAddr { reg1, reg2, addr } => {
                write!(f, "{}\t{}, {}, {}", self.op, reg1, reg2, addr)
            }
            Operands::SingleReg { reg } => write!(f, "{}\t{}", self.op, reg),
            Operands::None => write!(f, "{}", self.op),
        }
    }
}

// Like Ins's Display, but also shows where a relative address lands when the
// instruction sits at a known address.
pub struct InsAt<'a>(&'a Ins, Word);

impl fmt::Display for InsAt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let InsAt(ins, addr) = *self;
        write!(f, "{ins}")?;
        if let (true, Some(disp)) = (ins.op.is_pc_relative(), ins.operands.addr()) {
            let next = i64::from(addr) + 1;
            write!(f, "\t; -> {:#x}", next + i64::from(disp))?;
        }
        Ok(())
    }
}
