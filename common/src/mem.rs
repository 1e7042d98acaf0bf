use std::io::{self, Read};

use crate::constants::WORD_SIZE;

pub type Word = u32;

/// Sign-extends the low `bits` bits of `val`.
pub fn sign_extend(val: Word, bits: u32) -> i32 {
    debug_assert!(bits > 0 && bits <= Word::BITS);
    let shift = Word::BITS - bits;
    ((val << shift) as i32) >> shift
}

////////////////////////////////////////////////////////////////////////////////

pub trait ReadWord {
    fn read_word(&mut self) -> io::Result<Word>;
    fn read_words(&mut self, count: usize) -> io::Result<Vec<Word>>;
}

impl<T: Read> ReadWord for T {
    fn read_word(&mut self) -> io::Result<Word> {
        let mut buf = [0u8; WORD_SIZE];
        self.read_exact(&mut buf)?;
        Ok(Word::from_le_bytes(buf))
    }

    // Counts come straight out of file headers, so don't trust them for
    // preallocation.
    fn read_words(&mut self, count: usize) -> io::Result<Vec<Word>> {
        let want = count.checked_mul(WORD_SIZE).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "word count overflows")
        })?;

        let mut buf = Vec::new();
        self.take(want as u64).read_to_end(&mut buf)?;
        if buf.len() != want {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }

        Ok(buf
            .chunks_exact(WORD_SIZE)
            .map(|c| Word::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

////////////////////////////////////////////////////////////////////////////////

// Object files are assembled in memory and written out in one go, so the
// writing side is infallible.
pub trait PutWord {
    fn put_word(&mut self, val: Word);

    fn put_words(&mut self, vals: &[Word]) {
        for val in vals {
            self.put_word(*val);
        }
    }
}

impl PutWord for Vec<u8> {
    fn put_word(&mut self, val: Word) {
        self.extend_from_slice(&val.to_le_bytes());
    }
}

////////////////////////////////////////////////////////////////////////////////

// A panicking version, for sizes that are bounded by construction.
pub trait ToWordP {
    fn to_word_p(self) -> Word;
}

impl ToWordP for usize {
    fn to_word_p(self) -> Word {
        assert!(self <= Word::MAX as Self);
        self as Word
    }
}
