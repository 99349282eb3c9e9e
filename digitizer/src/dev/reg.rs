// SPDX-License-Identifier: GPL-3.0-or-later

//! Hardware register representation
//!
//! The digitizer exposes its registers through a single memory-mapped window.
//! Every access is a full 32-bit word at a fixed byte offset; registers that
//! hold less than a word ignore the upper bits on write and read them as zero.

use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicU32, Ordering};

use std::sync::Arc;

use crate::dev::bt848::{INT_STAT, INT_STAT_W1C_MASK};

/// Size in bytes of the register window decoded by the chip.
pub const REGISTER_WINDOW_SIZE: usize = 0x1000;

/// Word access to a register window.
///
/// Implementors provide `read` and `write`; the masked helpers are built on
/// top and are not atomic with respect to the hardware.
pub trait RegisterIo {

    /// Load the word at byte `offset`
    fn read(&self, offset: usize) -> u32;

    /// Store `value` at byte `offset`
    fn write(&self, offset: usize, value: u32);

    /// Set the bits of `mask`
    #[inline]
    fn or_mask(&self, offset: usize, mask: u32) {
        self.write(offset, self.read(offset) | mask)
    }

    /// Keep only the bits of `mask`
    #[inline]
    fn and_mask(&self, offset: usize, mask: u32) {
        self.write(offset, self.read(offset) & mask)
    }

    /// Load a register and view it as the bitfield `T`
    #[inline]
    fn read_as<T>(&self, offset: usize) -> T
        where
            T: From<u32>,
    {
        self.read(offset).into()
    }

    /// Store the bitfield `T` into a register
    #[inline]
    fn write_as<T>(&self, offset: usize, value: T)
        where
            T: Into<u32>,
    {
        self.write(offset, value.into())
    }

}

impl<T: RegisterIo + ?Sized> RegisterIo for &T {

    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }

    fn write(&self, offset: usize, value: u32) {
        (**self).write(offset, value)
    }

}

impl<T: RegisterIo + ?Sized> RegisterIo for Arc<T> {

    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }

    fn write(&self, offset: usize, value: u32) {
        (**self).write(offset, value)
    }

}

/// A mapped register window on real hardware.
pub struct Mmio {
    base: NonNull<u32>,
}

// The window is device memory; concurrent word accesses are what the chip expects.
unsafe impl Send for Mmio {}
unsafe impl Sync for Mmio {}

impl Mmio {

    /// Wraps a mapped register window.
    ///
    /// # Safety
    ///
    /// `base` must point at a mapping of at least [`REGISTER_WINDOW_SIZE`]
    /// bytes that stays valid for the lifetime of the returned value.
    pub unsafe fn new(base: NonNull<u32>) -> Self {
        Mmio { base }
    }

    #[inline(always)]
    fn word(&self, offset: usize) -> *mut u32 {
        debug_assert!(offset % 4 == 0 && offset < REGISTER_WINDOW_SIZE, "bad register offset {:#x}", offset);
        unsafe { self.base.as_ptr().add(offset / 4) }
    }

}

impl RegisterIo for Mmio {

    /// Volatile load of word from register
    #[inline(always)]
    fn read(&self, offset: usize) -> u32 {
        unsafe { ptr::read_volatile(self.word(offset)) }
    }

    /// Volatile store of word to register
    #[inline(always)]
    fn write(&self, offset: usize, value: u32) {
        unsafe { ptr::write_volatile(self.word(offset), value) }
    }

}

/// A register window backed by ordinary memory.
///
/// Used by the simulator and the tests. Stores behave like the chip's for the
/// one register where that matters: bits 0..=27 of the interrupt status
/// register are write-one-to-clear.
pub struct RegisterBank {
    words: Box<[AtomicU32]>,
}

impl RegisterBank {

    pub fn new() -> Self {
        let words = (0..REGISTER_WINDOW_SIZE / 4)
            .map(|_| AtomicU32::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        RegisterBank { words }
    }

    /// Sets bits directly, bypassing store semantics. This is how the
    /// simulated chip raises status.
    pub fn raise(&self, offset: usize, bits: u32) {
        self.words[offset / 4].fetch_or(bits, Ordering::AcqRel);
    }

    /// Replaces a register value directly, bypassing store semantics.
    pub fn force(&self, offset: usize, value: u32) {
        self.words[offset / 4].store(value, Ordering::Release);
    }

}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterIo for RegisterBank {

    fn read(&self, offset: usize) -> u32 {
        self.words[offset / 4].load(Ordering::Acquire)
    }

    fn write(&self, offset: usize, value: u32) {
        if offset == INT_STAT {
            self.words[offset / 4].fetch_and(!(value & INT_STAT_W1C_MASK), Ordering::AcqRel);
        } else {
            self.words[offset / 4].store(value, Ordering::Release);
        }
    }

}


// eof
