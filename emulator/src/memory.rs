use std::collections::TryReserveError;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use common::mem::Word;

use delegate::delegate;
use log::trace;

/// The word array every processor shares. Single words are always read and
/// written atomically; `lock()` hands out the coarse lock that the data
/// access instructions hold across their read-compare-write.
pub struct Memory {
    words: Vec<AtomicU32>,
    data_lock: Mutex<()>,
}

impl Memory {
    pub fn new(len: usize) -> Result<Memory, TryReserveError> {
        let mut words = Vec::new();
        words.try_reserve_exact(len)?;
        words.resize_with(len, || AtomicU32::new(0));
        Ok(Memory { words, data_lock: Mutex::new(()) })
    }

    delegate! {
        to self.words {
            pub fn len(&self) -> usize;
            pub fn is_empty(&self) -> bool;
        }
    }

    pub fn get(&self, addr: Word) -> Option<Word> {
        self.words.get(addr as usize).map(|w| w.load(Ordering::Relaxed))
    }

    pub fn set(&self, addr: Word, val: Word) -> Option<()> {
        trace!("Mem: writing {val:#010x} to {addr:#x}");
        self.words.get(addr as usize).map(|w| w.store(val, Ordering::Relaxed))
    }

    // The guarded value is (), so a panic while holding the lock can't leave
    // anything half updated.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.data_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Zeroes everything, then copies `image` to the bottom. The caller makes
    /// sure it fits.
    pub fn reset_with(&mut self, image: &[Word]) {
        assert!(image.len() <= self.words.len());
        for (i, word) in self.words.iter_mut().enumerate() {
            *word.get_mut() = image.get(i).copied().unwrap_or(0);
        }
    }
}
