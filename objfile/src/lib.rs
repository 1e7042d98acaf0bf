use std::fmt;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use common::constants::{EXECUTABLE_EXT, MODULE_EXT, SYMBOL_NAME_BYTES, SYMBOL_WORDS};
use common::mem::{PutWord, ReadWord, ToWordP, Word};

use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("can't open {}: {source}", path.display())]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("executable has {0} unresolved outsymbol words")]
    ContainsOutSymbols(Word),

    #[error("symbol name \"{0}\" is longer than 16 bytes")]
    NameTooLong(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

// Running out of input part way through a section means the header lied.
fn in_section<T>(res: io::Result<T>, section: &str) -> Result<T, FormatError> {
    res.map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            FormatError::InvalidFormat(format!("truncated {section}"))
        }
        _ => FormatError::Io(e),
    })
}


////////////////////////////////////////////////////////////////////////////////


/// A fixed 16 byte name field. The name ends at the first NUL, or fills the
/// whole field if there isn't one.
#[derive(Clone, Copy)]
pub struct SymbolName([u8; SYMBOL_NAME_BYTES]);

impl SymbolName {
    pub fn new(name: &str) -> Result<SymbolName, FormatError> {
        if name.len() > SYMBOL_NAME_BYTES {
            return Err(FormatError::NameTooLong(name.to_owned()));
        }
        let mut raw = [0u8; SYMBOL_NAME_BYTES];
        raw[..name.len()].copy_from_slice(name.as_bytes());
        Ok(SymbolName(raw))
    }

    pub fn from_raw(raw: [u8; SYMBOL_NAME_BYTES]) -> SymbolName {
        SymbolName(raw)
    }

    /// The whole field, including whatever follows the terminator.
    pub fn raw(&self) -> &[u8; SYMBOL_NAME_BYTES] {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        let len = self.0.iter().position(|b| *b == 0).unwrap_or(SYMBOL_NAME_BYTES);
        &self.0[..len]
    }

    pub fn matches(&self, name: &str) -> bool {
        self.as_bytes() == name.as_bytes()
    }
}

impl PartialEq for SymbolName {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for SymbolName {}

impl Hash for SymbolName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl fmt::Display for SymbolName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Debug for SymbolName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.as_bytes()))
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    pub name: SymbolName,
    pub addr: Word,
}

impl Symbol {
    pub fn new(name: &str, addr: Word) -> Result<Symbol, FormatError> {
        Ok(Symbol { name: SymbolName::new(name)?, addr })
    }

    fn read_from(reader: &mut impl Read) -> io::Result<Symbol> {
        let mut raw = [0u8; SYMBOL_NAME_BYTES];
        reader.read_exact(&mut raw)?;
        let addr = reader.read_word()?;
        Ok(Symbol { name: SymbolName(raw), addr })
    }

    fn put(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.name.raw());
        out.put_word(self.addr);
    }
}

fn read_symbols(reader: &mut impl Read, words: Word, section: &str) -> Result<Vec<Symbol>, FormatError> {
    if words % SYMBOL_WORDS != 0 {
        return Err(FormatError::InvalidFormat(format!(
            "{section} size {words} is not a multiple of {SYMBOL_WORDS} words"
        )));
    }

    let mut syms = vec![];
    for _ in 0..words / SYMBOL_WORDS {
        syms.push(in_section(Symbol::read_from(reader), section)?);
    }
    Ok(syms)
}

fn symbol_words(syms: &[Symbol]) -> Word {
    syms.len().to_word_p() * SYMBOL_WORDS
}

pub fn find_symbol<'a>(syms: &'a [Symbol], name: &str) -> Option<&'a Symbol> {
    syms.iter().find(|s| s.name.matches(name))
}


////////////////////////////////////////////////////////////////////////////////


/// Section sizes, all in words.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    pub insym_words: Word,
    pub outsym_words: Word,
    pub code_words: Word,
}

impl Header {
    fn read_from(reader: &mut impl Read) -> Result<Header, FormatError> {
        let mut field = || in_section(reader.read_word(), "header");
        Ok(Header {
            insym_words: field()?,
            outsym_words: field()?,
            code_words: field()?,
        })
    }

    fn put(&self, out: &mut Vec<u8>) {
        out.put_words(&[self.insym_words, self.outsym_words, self.code_words]);
    }
}

fn read_code(reader: &mut impl Read, hdr: &Header) -> Result<Vec<Word>, FormatError> {
    let code = in_section(reader.read_words(hdr.code_words as usize), "code")?;

    // Make sure we read the whole file.
    let mut buf = [0u8; 1];
    if reader.read(&mut buf)? != 0 {
        return Err(FormatError::InvalidFormat("trailing data after code".into()));
    }
    Ok(code)
}


////////////////////////////////////////////////////////////////////////////////


/// One linker input: exported labels, unresolved references and code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Module {
    pub insymbols: Vec<Symbol>,
    pub outsymbols: Vec<Symbol>,
    pub code: Vec<Word>,
}

impl Module {
    pub fn header(&self) -> Header {
        Header {
            insym_words: symbol_words(&self.insymbols),
            outsym_words: symbol_words(&self.outsymbols),
            code_words: self.code.len().to_word_p(),
        }
    }

    pub fn read_from(reader: &mut impl Read) -> Result<Module, FormatError> {
        let hdr = Header::read_from(reader)?;
        let insymbols = read_symbols(reader, hdr.insym_words, "insymbols")?;
        let outsymbols = read_symbols(reader, hdr.outsym_words, "outsymbols")?;
        let code = read_code(reader, &hdr)?;
        Ok(Module { insymbols, outsymbols, code })
    }

    pub fn from_bytes(mut bytes: &[u8]) -> Result<Module, FormatError> {
        Self::read_from(&mut bytes)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![];
        self.header().put(&mut out);
        for sym in self.insymbols.iter().chain(&self.outsymbols) {
            sym.put(&mut out);
        }
        out.put_words(&self.code);
        out
    }

    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        writer.write_all(&self.to_bytes())
    }
}


/// A fully resolved module, ready to load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Executable {
    pub symbols: Vec<Symbol>,
    pub code: Vec<Word>,
}

impl Executable {
    pub fn header(&self) -> Header {
        Header {
            insym_words: symbol_words(&self.symbols),
            outsym_words: 0,
            code_words: self.code.len().to_word_p(),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Word> {
        find_symbol(&self.symbols, name).map(|s| s.addr)
    }

    pub fn read_from(reader: &mut impl Read) -> Result<Executable, FormatError> {
        let hdr = Header::read_from(reader)?;
        if hdr.outsym_words != 0 {
            return Err(FormatError::ContainsOutSymbols(hdr.outsym_words));
        }
        let symbols = read_symbols(reader, hdr.insym_words, "insymbols")?;
        let code = read_code(reader, &hdr)?;
        Ok(Executable { symbols, code })
    }

    pub fn from_bytes(mut bytes: &[u8]) -> Result<Executable, FormatError> {
        Self::read_from(&mut bytes)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![];
        self.header().put(&mut out);
        for sym in &self.symbols {
            sym.put(&mut out);
        }
        out.put_words(&self.code);
        out
    }

    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        writer.write_all(&self.to_bytes())
    }
}


////////////////////////////////////////////////////////////////////////////////


fn open_with_ext(path: &Path, ext: &str) -> Result<BufReader<File>, FormatError> {
    let file = File::open(path).map_err(|source| FormatError::FileNotFound {
        path: path.to_owned(),
        source,
    })?;

    if path.extension().and_then(|e| e.to_str()) != Some(ext) {
        return Err(FormatError::InvalidFormat(format!(
            "{} doesn't end in .{ext}",
            path.display()
        )));
    }
    Ok(BufReader::new(file))
}

pub fn read_module_file(path: impl AsRef<Path>) -> Result<Module, FormatError> {
    let path = path.as_ref();
    let module = Module::read_from(&mut open_with_ext(path, MODULE_EXT)?)?;
    debug!(
        "Read module {}: {} insymbols, {} outsymbols, {} code words",
        path.display(),
        module.insymbols.len(),
        module.outsymbols.len(),
        module.code.len()
    );
    Ok(module)
}

pub fn read_executable_file(path: impl AsRef<Path>) -> Result<Executable, FormatError> {
    let path = path.as_ref();
    let exe = Executable::read_from(&mut open_with_ext(path, EXECUTABLE_EXT)?)?;
    debug!(
        "Read executable {}: {} symbols, {} code words",
        path.display(),
        exe.symbols.len(),
        exe.code.len()
    );
    Ok(exe)
}

pub fn write_executable_file(path: impl AsRef<Path>, exe: &Executable) -> Result<(), FormatError> {
    let mut out = File::create(path.as_ref())?;
    exe.write_to(&mut out)?;
    out.flush()?;
    Ok(())
}
