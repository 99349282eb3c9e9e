// SPDX-License-Identifier: GPL-3.0-or-later

//! DMA-visible memory
//!
//! The sequencer fetches its instructions and writes its pixels by bus
//! address. Programs live in regions handed out by a [`DmaMemory`]; capture
//! buffers are owned by the allocator too and are only ever referred to by
//! [`BufferId`] and byte offset.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::{CaptureError, Result};

/// Page granularity assumed when an allocator does not say otherwise
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Capture buffers known to the allocator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferId {

    /// One of the two grab buffers
    Grab(usize),

    /// The VBI sample buffer
    Vbi,

}

/// A block of words the sequencer can fetch from.
///
/// Every word is an atomic so a store is never observed half written; regions
/// shared with the running sequencer are only ever patched one word at a time.
pub struct DmaRegion {
    bus: u32,
    words: Arc<[AtomicU32]>,
}

impl DmaRegion {

    /// Wraps freshly allocated words located at `bus`
    pub fn new(bus: u32, words: Arc<[AtomicU32]>) -> Self {
        DmaRegion { bus, words }
    }

    /// Bus address of the first word
    #[inline]
    pub fn bus_address(&self) -> u32 {
        self.bus
    }

    /// Bus address of word `index`
    #[inline]
    pub fn word_address(&self, index: usize) -> u32 {
        self.bus + (index * 4) as u32
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    #[inline]
    pub fn load(&self, index: usize) -> u32 {
        self.words[index].load(Ordering::Acquire)
    }

    /// Single-word store, visible to the sequencer as a whole
    #[inline]
    pub fn store(&self, index: usize, value: u32) {
        self.words[index].store(value, Ordering::Release)
    }

    /// Copies the region out, for inspection
    pub fn snapshot(&self) -> Vec<u32> {
        (0..self.len()).map(|i| self.load(i)).collect()
    }

}

/// Source of DMA-capable memory and of bus addresses for capture buffers
pub trait DmaMemory {

    /// Allocates `words` words of instruction memory
    fn alloc(&self, words: usize) -> Result<DmaRegion>;

    /// Bus address of byte `offset` within `buffer`, or `None` past its end
    fn bus_address(&self, buffer: BufferId, offset: usize) -> Option<u32>;

    /// Size of `buffer` in bytes
    fn buffer_len(&self, buffer: BufferId) -> usize;

    /// Granularity at which buffer pages may be scattered on the bus
    fn page_size(&self) -> usize {
        DEFAULT_PAGE_SIZE
    }

}

impl<T: DmaMemory + ?Sized> DmaMemory for &T {

    fn alloc(&self, words: usize) -> Result<DmaRegion> {
        (**self).alloc(words)
    }

    fn bus_address(&self, buffer: BufferId, offset: usize) -> Option<u32> {
        (**self).bus_address(buffer, offset)
    }

    fn buffer_len(&self, buffer: BufferId) -> usize {
        (**self).buffer_len(buffer)
    }

    fn page_size(&self) -> usize {
        (**self).page_size()
    }

}

impl<T: DmaMemory + ?Sized> DmaMemory for Arc<T> {

    fn alloc(&self, words: usize) -> Result<DmaRegion> {
        (**self).alloc(words)
    }

    fn bus_address(&self, buffer: BufferId, offset: usize) -> Option<u32> {
        (**self).bus_address(buffer, offset)
    }

    fn buffer_len(&self, buffer: BufferId) -> usize {
        (**self).buffer_len(buffer)
    }

    fn page_size(&self) -> usize {
        (**self).page_size()
    }

}

/// How [`HostDma`] lays buffer pages out on the bus
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageLayout {

    /// Each buffer is one physically contiguous block
    Contiguous,

    /// Pages of a buffer appear on the bus in reverse order, so no two
    /// neighbouring pages are adjacent
    Scattered,

}

const PROGRAM_BUS_BASE: u32 = 0x0010_0000;
const VBI_BUS_BASE: u32 = 0x0800_0000;
const GRAB_BUS_BASE: u32 = 0x1000_0000;
const GRAB_BUS_STRIDE: u32 = 0x0100_0000;

/// Bytes in the VBI buffer: 16 lines per field at a 2048-byte pitch
pub const VBI_BUFFER_LEN: usize = 2 * 16 * 2048;

/// Host-memory allocator with a made-up bus address space.
///
/// Program regions are handed out from a bump pointer and remembered (weakly)
/// so the simulated sequencer can fetch from them by bus address.
pub struct HostDma {
    grab_len: usize,
    page_size: usize,
    layout: PageLayout,
    next_bus: Mutex<u32>,
    regions: Mutex<Vec<(u32, Weak<[AtomicU32]>)>>,
    exhausted: AtomicBool,
}

impl HostDma {

    pub fn new(grab_len: usize) -> Self {
        Self::with_layout(grab_len, DEFAULT_PAGE_SIZE, PageLayout::Contiguous)
    }

    pub fn with_layout(grab_len: usize, page_size: usize, layout: PageLayout) -> Self {
        assert!(page_size.is_power_of_two());
        assert!(grab_len as u64 <= GRAB_BUS_STRIDE as u64);
        HostDma {
            grab_len,
            page_size,
            layout,
            next_bus: Mutex::new(PROGRAM_BUS_BASE),
            regions: Mutex::new(Vec::new()),
            exhausted: AtomicBool::new(false),
        }
    }

    /// While set, every allocation fails
    pub fn set_exhausted(&self, exhausted: bool) {
        self.exhausted.store(exhausted, Ordering::Release);
    }

    /// Number of program regions still alive
    pub fn live_regions(&self) -> usize {
        let mut regions = self.regions.lock();
        regions.retain(|(_, weak)| weak.strong_count() > 0);
        regions.len()
    }

    /// Fetches an instruction word, as the sequencer would
    pub fn read_word(&self, bus: u32) -> Option<u32> {
        let regions = self.regions.lock();
        regions.iter().find_map(|(base, weak)| {
            let words = weak.upgrade()?;
            let end = *base as u64 + words.len() as u64 * 4;
            if bus >= *base && (bus as u64) < end && (bus - base) % 4 == 0 {
                Some(words[((bus - base) / 4) as usize].load(Ordering::Acquire))
            } else {
                None
            }
        })
    }

    /// Maps a bus address back to the buffer and byte offset it belongs to
    pub fn locate(&self, bus: u32) -> Option<(BufferId, usize)> {
        if (VBI_BUS_BASE..VBI_BUS_BASE + VBI_BUFFER_LEN as u32).contains(&bus) {
            return Some((BufferId::Vbi, (bus - VBI_BUS_BASE) as usize));
        }
        if bus < GRAB_BUS_BASE {
            return None;
        }
        let index = ((bus - GRAB_BUS_BASE) / GRAB_BUS_STRIDE) as usize;
        let local = ((bus - GRAB_BUS_BASE) % GRAB_BUS_STRIDE) as usize;
        if index >= 2 || local >= self.grab_len {
            return None;
        }
        let offset = match self.layout {
            PageLayout::Contiguous => local,
            PageLayout::Scattered => {
                let pages = self.grab_pages();
                let page = pages - 1 - local / self.page_size;
                page * self.page_size + local % self.page_size
            }
        };
        Some((BufferId::Grab(index), offset))
    }

    fn grab_pages(&self) -> usize {
        (self.grab_len + self.page_size - 1) / self.page_size
    }

}

impl DmaMemory for HostDma {

    fn alloc(&self, words: usize) -> Result<DmaRegion> {
        if self.exhausted.load(Ordering::Acquire) {
            return Err(CaptureError::Allocation { words });
        }
        let storage: Arc<[AtomicU32]> = (0..words)
            .map(|_| AtomicU32::new(0))
            .collect::<Vec<_>>()
            .into();
        let bytes = (words * 4) as u32;
        let page = self.page_size as u32;
        let bus = {
            let mut next = self.next_bus.lock();
            let bus = *next;
            let span = (bytes + page - 1) / page * page;
            if bus.checked_add(span.max(page)).map_or(true, |end| end > VBI_BUS_BASE) {
                return Err(CaptureError::Allocation { words });
            }
            *next = bus + span.max(page);
            bus
        };
        let mut regions = self.regions.lock();
        regions.retain(|(_, weak)| weak.strong_count() > 0);
        regions.push((bus, Arc::downgrade(&storage)));
        Ok(DmaRegion::new(bus, storage))
    }

    fn bus_address(&self, buffer: BufferId, offset: usize) -> Option<u32> {
        match buffer {
            BufferId::Vbi => (offset < VBI_BUFFER_LEN).then(|| VBI_BUS_BASE + offset as u32),
            BufferId::Grab(index) if index < 2 && offset < self.grab_len => {
                let base = GRAB_BUS_BASE + index as u32 * GRAB_BUS_STRIDE;
                let local = match self.layout {
                    PageLayout::Contiguous => offset,
                    PageLayout::Scattered => {
                        let page = self.grab_pages() - 1 - offset / self.page_size;
                        page * self.page_size + offset % self.page_size
                    }
                };
                Some(base + local as u32)
            }
            BufferId::Grab(_) => None,
        }
    }

    fn buffer_len(&self, buffer: BufferId) -> usize {
        match buffer {
            BufferId::Vbi => VBI_BUFFER_LEN,
            BufferId::Grab(index) if index < 2 => self.grab_len,
            BufferId::Grab(_) => 0,
        }
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn regions_are_fetchable_while_alive() {
        let mem = HostDma::new(0x10000);
        let region = mem.alloc(4).unwrap();
        region.store(2, 0xdead_beef);
        assert_eq!(mem.read_word(region.word_address(2)), Some(0xdead_beef));
        let bus = region.bus_address();
        drop(region);
        assert_eq!(mem.read_word(bus), None);
        assert_eq!(mem.live_regions(), 0);
    }

    #[test]
    fn exhausted_allocator_reports_the_request() {
        let mem = HostDma::new(0x10000);
        mem.set_exhausted(true);
        assert_eq!(mem.alloc(7).err(), Some(CaptureError::Allocation { words: 7 }));
    }

    #[test]
    fn scattered_pages_round_trip_through_locate() {
        let mem = HostDma::with_layout(4 * 4096, 4096, PageLayout::Scattered);
        let first = mem.bus_address(BufferId::Grab(1), 10).unwrap();
        let next_page = mem.bus_address(BufferId::Grab(1), 4096).unwrap();
        assert_ne!(first + 4086, next_page);
        assert_eq!(mem.locate(first), Some((BufferId::Grab(1), 10)));
        assert_eq!(mem.locate(next_page), Some((BufferId::Grab(1), 4096)));
        assert_eq!(mem.bus_address(BufferId::Grab(1), 4 * 4096), None);
    }

}

// eof
