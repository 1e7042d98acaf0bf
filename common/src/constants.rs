pub const WORD_SIZE: usize = 4; // Bytes

pub const SYMBOL_NAME_BYTES: usize = 16;
pub const SYMBOL_WORDS: u32 = 5; // Name plus address
pub const HEADER_WORDS: usize = 3;

pub const ENTRY_POINT: &str = "mainx20";

pub const MEM_WORDS: usize = 10_000_000;

pub const MODULE_EXT: &str = "obj";
pub const EXECUTABLE_EXT: &str = "exe";
