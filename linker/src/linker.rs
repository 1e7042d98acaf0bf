use std::collections::HashSet;
use std::path::Path;

use common::asm::{AddrField, Opcode};
use common::constants::ENTRY_POINT;
use common::decoder::classify;
use common::mem::{ToWordP, Word};
use objfile::{Executable, FormatError, Module, Symbol, SymbolName, read_module_file};

use log::{debug, info, trace};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("duplicate insymbol definition {0}")]
    DuplicateSymbol(SymbolName),

    #[error("could not find main function mainx20")]
    MissingEntryPoint,

    #[error("could not resolve outsymbol {name} (module {module})")]
    UnresolvedSymbol { name: SymbolName, module: usize },

    #[error("outsymbol {name} (module {module}) points at word {addr}, past the end of its code")]
    ReferenceOutOfRange { name: SymbolName, module: usize, addr: Word },

    #[error("instruction {word:#010x} at {idx} refers to {name} but has no address field")]
    NoAddressField { name: SymbolName, idx: Word, word: Word },

    #[error("displacement {disp} to {name} doesn't fit the instruction at {idx}")]
    DisplacementOverflow { name: SymbolName, idx: Word, disp: i64 },
}

pub fn link(modules: &[Module]) -> Result<Executable, LinkError> {
    Linker::new(modules).link()
}

pub fn link_files<P: AsRef<Path>>(paths: &[P]) -> Result<Executable, LinkError> {
    let modules = paths
        .iter()
        .map(read_module_file)
        .collect::<Result<Vec<_>, _>>()?;
    link(&modules)
}


struct Linker<'a> {
    modules: &'a [Module],
    // Where each module's code starts in the merged image.
    bases: Vec<Word>,
    code: Vec<Word>,
}

impl<'a> Linker<'a> {
    fn new(modules: &'a [Module]) -> Linker<'a> {
        let mut bases = Vec::with_capacity(modules.len());
        let mut code = vec![];
        for module in modules {
            bases.push(code.len().to_word_p());
            code.extend_from_slice(&module.code);
        }
        Linker { modules, bases, code }
    }

    fn link(mut self) -> Result<Executable, LinkError> {
        let symbols = self.rebased_insymbols();
        Self::check_unique(&symbols)?;
        if !symbols.iter().any(|s| s.name.matches(ENTRY_POINT)) {
            return Err(LinkError::MissingEntryPoint);
        }

        let total: usize = self.modules.iter().map(|m| m.outsymbols.len()).sum();
        let (resolved, unresolved) = self.resolve()?;
        debug_assert_eq!(resolved + unresolved.len(), total);
        if let Some(&(module, name)) = unresolved.first() {
            return Err(LinkError::UnresolvedSymbol { name, module });
        }

        info!(
            "Linked {} modules: {} code words, {} symbols, {resolved} references resolved",
            self.modules.len(),
            self.code.len(),
            symbols.len()
        );
        Ok(Executable { symbols, code: self.code })
    }

    fn rebased_insymbols(&self) -> Vec<Symbol> {
        self.modules
            .iter()
            .zip(&self.bases)
            .flat_map(|(module, base)| {
                module.insymbols.iter().map(move |sym| Symbol {
                    name: sym.name,
                    addr: sym.addr.wrapping_add(*base),
                })
            })
            .collect()
    }

    fn check_unique(symbols: &[Symbol]) -> Result<(), LinkError> {
        let mut seen = HashSet::new();
        for sym in symbols {
            if !seen.insert(sym.name) {
                return Err(LinkError::DuplicateSymbol(sym.name));
            }
        }
        Ok(())
    }

    // Global address of `name`, looking only outside module `from`.
    fn find_definition(&self, from: usize, name: &SymbolName) -> Option<Word> {
        self.modules
            .iter()
            .zip(&self.bases)
            .enumerate()
            .filter(|(j, _)| *j != from)
            .find_map(|(_, (module, base))| {
                module
                    .insymbols
                    .iter()
                    .find(|sym| sym.name == *name)
                    .map(|sym| sym.addr.wrapping_add(*base))
            })
    }

    // Returns the number of references patched, and the ones that weren't.
    fn resolve(&mut self) -> Result<(usize, Vec<(usize, SymbolName)>), LinkError> {
        let modules = self.modules;
        let mut resolved = 0;
        let mut unresolved = vec![];
        for (i, module) in modules.iter().enumerate() {
            for out in &module.outsymbols {
                let Some(target) = self.find_definition(i, &out.name) else {
                    debug!("No definition of {} for module {i}", out.name);
                    unresolved.push((i, out.name));
                    continue;
                };
                self.patch(i, out, target)?;
                resolved += 1;
            }
        }
        Ok((resolved, unresolved))
    }

    fn patch(&mut self, module: usize, out: &Symbol, target: Word) -> Result<(), LinkError> {
        if out.addr as usize >= self.modules[module].code.len() {
            return Err(LinkError::ReferenceOutOfRange { name: out.name, module, addr: out.addr });
        }
        let idx = self.bases[module] + out.addr;
        let word = self.code[idx as usize];

        let Some(field) = classify(word & Opcode::MASK).addr_field() else {
            return Err(LinkError::NoAddressField { name: out.name, idx, word });
        };

        // 20-bit fields are relative to idx + 1, 16-bit fields to idx - 1.
        let origin = match field {
            AddrField::Wide20 => i64::from(idx) + 1,
            AddrField::Narrow16 => i64::from(idx) - 1,
        };
        let disp = i64::from(target) - origin;
        let patched = i32::try_from(disp)
            .ok()
            .and_then(|d| field.insert(word, d))
            .ok_or(LinkError::DisplacementOverflow { name: out.name, idx, disp })?;

        trace!(
            "Resolving \"{}\" at {idx}: target {target}, displacement {disp}, {word:#010x} -> {patched:#010x}",
            out.name
        );
        self.code[idx as usize] = patched;
        Ok(())
    }
}
