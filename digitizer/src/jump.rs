// SPDX-License-Identifier: GPL-3.0-or-later

//! The jump table: the only program the sequencer is ever started on
//!
//! The table is seven two-word instructions, run once per frame:
//!
//! ```text
//!     0  SYNC  vertical resync, odd field follows
//!     1  JUMP  VBI odd program        (or on to 2)
//!     2  JUMP  capture odd program    (or on to 3)
//!     3  SYNC  vertical resync, even field follows
//!     4  JUMP  VBI even program       (or on to 5)
//!     5  JUMP  capture even program   (or on to 6)
//!     6  JUMP  slot 0
//! ```
//!
//! Each field program jumps back into the table when it is done. Linking a
//! program means rewriting operand words of slots 1, 2, 4 and 5; the command
//! words never change, except for the loop slot's interrupt flag.

use log::debug;
use num_enum::IntoPrimitive;

use crate::dev::dma::{DmaMemory, DmaRegion};
use crate::dev::risc::RiscStatus;
use crate::dev::risc::commands::sync::FifoStatus;
use crate::dev::risc::program::{EntryPoints, Instruction, Linkage, ProgramBuilder, jump_command};
use crate::error::Result;

/// Slots of the jump table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, IntoPrimitive)]
#[repr(usize)]
pub enum Slot {
    SyncOdd = 0,
    VbiOdd = 1,
    CaptureOdd = 2,
    SyncEven = 3,
    VbiEven = 4,
    CaptureEven = 5,
    Loop = 6,
}

impl Slot {

    pub const COUNT: usize = 7;

    #[inline]
    fn index(self) -> usize {
        self.into()
    }

}

/// The resident jump table
pub struct JumpTable {
    region: DmaRegion,
}

impl JumpTable {

    /// Builds the table with nothing linked
    pub fn new<M>(mem: &M) -> Result<Self>
        where
            M: DmaMemory + ?Sized,
    {
        let region = mem.alloc(2 * Slot::COUNT)?;
        let base = region.bus_address();
        let slot = |s: Slot| base + (s.index() * 8) as u32;

        let mut builder = ProgramBuilder::new(2 * Slot::COUNT);
        builder.sync(FifoStatus::VerticalResyncEven, true);
        builder.jump(slot(Slot::CaptureOdd), None);
        builder.jump(slot(Slot::SyncEven), None);
        builder.sync(FifoStatus::VerticalResyncOdd, false);
        builder.jump(slot(Slot::CaptureEven), None);
        builder.jump(slot(Slot::Loop), None);
        builder.jump(slot(Slot::SyncOdd), None);

        // Assembled after allocating, since the jumps need the table's address.
        for (i, word) in builder.words().iter().enumerate() {
            region.store(i, *word);
        }
        debug!("jump table at {:#010x}", base);
        Ok(JumpTable { region })
    }

    /// Where the sequencer is started
    #[inline]
    pub fn bus_address(&self) -> u32 {
        self.region.bus_address()
    }

    #[inline]
    pub fn slot_address(&self, slot: Slot) -> u32 {
        self.region.word_address(slot.index() * 2)
    }

    /// Return addresses for capture programs: the odd field returns to the
    /// even field's sync, the even field to the loop.
    pub fn capture_linkage(&self) -> Linkage {
        Linkage {
            odd_return: self.slot_address(Slot::SyncEven),
            even_return: self.slot_address(Slot::Loop),
        }
    }

    /// Return addresses for VBI programs: each field goes on to its capture slot.
    pub fn vbi_linkage(&self) -> Linkage {
        Linkage {
            odd_return: self.slot_address(Slot::CaptureOdd),
            even_return: self.slot_address(Slot::CaptureEven),
        }
    }

    /// Current target of a jump slot
    pub fn target(&self, slot: Slot) -> u32 {
        self.region.load(slot.index() * 2 + 1)
    }

    /// Decodes a slot
    pub fn instruction(&self, slot: Slot) -> Option<Instruction> {
        let at = slot.index() * 2;
        let words = [self.region.load(at), self.region.load(at + 1)];
        Instruction::decode(&words).map(|(instruction, _)| instruction)
    }

    fn store_target(&self, slot: Slot, target: u32) {
        if self.target(slot) != target {
            self.region.store(slot.index() * 2 + 1, target);
        }
    }

    /// Points the capture slots at `programs`, or lets them fall through.
    /// The VBI slots are not touched.
    pub fn link_capture(&self, programs: Option<EntryPoints>) {
        let (odd, even) = match programs {
            Some(entry) => (entry.odd, entry.even),
            None => (self.slot_address(Slot::SyncEven), self.slot_address(Slot::Loop)),
        };
        self.store_target(Slot::CaptureOdd, odd);
        self.store_target(Slot::CaptureEven, even);
    }

    /// Points the VBI slots at `programs`, or lets them fall through.
    /// The capture slots are not touched.
    pub fn link_vbi(&self, programs: Option<EntryPoints>) {
        let (odd, even) = match programs {
            Some(entry) => (entry.odd, entry.even),
            None => (self.slot_address(Slot::CaptureOdd), self.slot_address(Slot::CaptureEven)),
        };
        self.store_target(Slot::VbiOdd, odd);
        self.store_target(Slot::VbiEven, even);
    }

    /// Links both kinds of program at once
    pub fn install(&self, capture: Option<EntryPoints>, vbi: Option<EntryPoints>) {
        self.link_capture(capture);
        self.link_vbi(vbi);
        debug!("linked capture {:x?}, vbi {:x?}", capture, vbi);
    }

    /// Makes the loop slot raise a frame-start interrupt, or stop doing so
    pub fn arm_frame_start(&self, armed: bool) {
        let tag = armed.then_some(RiscStatus::FRAME_START);
        self.region.store(Slot::Loop.index() * 2, jump_command(tag).into());
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.instruction(Slot::Loop), Some(Instruction::Jump { irq: true, .. }))
    }

}


// eof
