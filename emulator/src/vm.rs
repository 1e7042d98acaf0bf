use std::io::{self, Write};
use std::path::Path;
use std::thread;

use common::asm::Ins;
use common::constants::MEM_WORDS;
use common::mem::{ToWordP, Word};
use objfile::{Executable, FormatError, Symbol, find_symbol, read_executable_file};

use crate::memory::Memory;
use crate::processor::{Processor, Status};
use crate::registers::Registers;
use crate::trace::Tracer;

use log::{debug, info};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("could not allocate {0} words of memory")]
    InitializeFailure(usize),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("{code_words} words of code don't fit in {mem_words} words of memory")]
    ImageTooLarge { code_words: usize, mem_words: usize },

    #[error("label {0} not found")]
    LabelNotFound(String),

    #[error("address {0:#x} is outside the code")]
    AddressOutOfRange(Word),

    #[error("no executable loaded")]
    NoExecutable,

    #[error("{given} stack pointers given for {processors} processors")]
    StackPointerCount { processors: usize, given: usize },

    #[error("could not start processor {id}: {source}")]
    Spawn { id: usize, source: io::Error },

    #[error("processor {0} panicked")]
    ProcessorPanicked(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    pub mem_words: usize,
}

impl Default for VmConfig {
    fn default() -> VmConfig {
        VmConfig { mem_words: MEM_WORDS }
    }
}

impl VmConfig {
    pub fn with_mem_words(mut self, mem_words: usize) -> VmConfig {
        self.mem_words = mem_words;
        self
    }
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorReport {
    pub status: Status,
    pub regs: Registers,
}

/// One entry per processor, in id order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub processors: Vec<ProcessorReport>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.processors.iter().all(|p| p.status.is_normal_termination())
    }

    pub fn statuses(&self) -> Vec<Status> {
        self.processors.iter().map(|p| p.status).collect()
    }
}


pub struct Vm {
    config: VmConfig,
    mem: Memory,
    symbols: Vec<Symbol>,
    code_words: Word,
    loaded: bool,
    tracer: Tracer,
}

impl Vm {
    pub fn initialize(config: VmConfig) -> Result<Vm, VmError> {
        let mem = Memory::new(config.mem_words)
            .map_err(|_| VmError::InitializeFailure(config.mem_words))?;
        debug!("VM: {} words of memory", config.mem_words);
        Ok(Vm {
            config,
            mem,
            symbols: vec![],
            code_words: 0,
            loaded: false,
            tracer: Tracer::stdout(),
        })
    }

    pub fn new() -> Result<Vm, VmError> {
        Self::initialize(VmConfig::default())
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn set_trace_output(&mut self, out: impl Write + Send + 'static) {
        self.tracer.set_output(out);
    }

    pub fn load(&mut self, bytes: &[u8]) -> Result<(), VmError> {
        let exe = Executable::from_bytes(bytes)?;
        self.load_executable(exe)
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), VmError> {
        let exe = read_executable_file(path)?;
        self.load_executable(exe)
    }

    pub fn load_executable(&mut self, exe: Executable) -> Result<(), VmError> {
        if exe.code.len() > self.mem.len() {
            return Err(VmError::ImageTooLarge {
                code_words: exe.code.len(),
                mem_words: self.mem.len(),
            });
        }

        self.mem.reset_with(&exe.code);
        self.code_words = exe.code.len().to_word_p();
        self.symbols = exe.symbols;
        self.loaded = true;
        info!("VM: loaded {} code words, {} symbols", self.code_words, self.symbols.len());
        Ok(())
    }

    pub fn code_words(&self) -> Word {
        self.code_words
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn resolve_label(&self, name: &str) -> Result<Word, VmError> {
        find_symbol(&self.symbols, name)
            .map(|sym| sym.addr)
            .ok_or_else(|| VmError::LabelNotFound(name.to_owned()))
    }

    pub fn read_word(&self, addr: Word) -> Result<Word, VmError> {
        self.check_code_addr(addr)?;
        self.mem.get(addr).ok_or(VmError::AddressOutOfRange(addr))
    }

    pub fn write_word(&mut self, addr: Word, val: Word) -> Result<(), VmError> {
        self.check_code_addr(addr)?;
        self.mem.set(addr, val).ok_or(VmError::AddressOutOfRange(addr))
    }

    /// Decodes the word at `addr`; `None` if it isn't a legal instruction.
    pub fn disassemble(&self, addr: Word) -> Result<Option<Ins>, VmError> {
        self.read_word(addr).map(Ins::decode)
    }

    fn check_code_addr(&self, addr: Word) -> Result<(), VmError> {
        if addr >= self.code_words {
            return Err(VmError::AddressOutOfRange(addr));
        }
        Ok(())
    }

    /// Runs `initial_sps.len()` processors, all starting at address 0, and
    /// waits for every one of them to stop.
    pub fn run(
        &self,
        processors: usize,
        initial_sps: &[Word],
        trace: bool,
    ) -> Result<RunReport, VmError> {
        if !self.loaded {
            return Err(VmError::NoExecutable);
        }
        if initial_sps.len() != processors {
            return Err(VmError::StackPointerCount { processors, given: initial_sps.len() });
        }

        info!("VM: running {processors} processors");
        let tracer = trace.then_some(&self.tracer);
        let count = processors.to_word_p();

        let results = thread::scope(|s| {
            let mut handles = Vec::with_capacity(processors);
            for (id, sp) in initial_sps.iter().enumerate() {
                let cpu = Processor::new(
                    id.to_word_p(),
                    count,
                    *sp,
                    &self.mem,
                    self.code_words,
                    tracer,
                );
                let handle = thread::Builder::new()
                    .name(format!("processor-{id}"))
                    .spawn_scoped(s, move || cpu.run())
                    .map_err(|source| VmError::Spawn { id, source });
                match handle {
                    Ok(handle) => handles.push(handle),
                    // The scope still joins whatever already started.
                    Err(e) => return Err(e),
                }
            }

            // Join everything before reporting a panic.
            let joined: Vec<_> = handles.into_iter().map(|h| h.join()).collect();
            joined
                .into_iter()
                .enumerate()
                .map(|(id, res)| {
                    let (status, regs) = res.map_err(|_| VmError::ProcessorPanicked(id))?;
                    Ok(ProcessorReport { status, regs })
                })
                .collect::<Result<Vec<_>, _>>()
        })?;

        for (id, report) in results.iter().enumerate() {
            debug!("VM: processor {id} finished: {}", report.status);
        }
        Ok(RunReport { processors: results })
    }

    pub fn teardown(self) {
        debug!("VM: teardown");
    }
}

/// Splits the top of memory into one `stack_size` region per processor, with
/// processor 0 at the very top. `None` if they don't fit.
pub fn spaced_stack_pointers(
    mem_words: usize,
    processors: usize,
    stack_size: usize,
) -> Option<Vec<Word>> {
    let needed = processors.checked_mul(stack_size)?;
    if needed > mem_words {
        return None;
    }
    (0..processors)
        .map(|i| Word::try_from(mem_words - i * stack_size).ok())
        .collect()
}
