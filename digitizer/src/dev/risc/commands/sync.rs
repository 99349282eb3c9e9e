// SPDX-License-Identifier: GPL-3.0-or-later

//! RISC Instruction - Sync

use num_enum::{FromPrimitive, IntoPrimitive};
use proc_bitfield::bitfield;

use super::Opcode;

bitfield! {

    /// Stall until the FIFO reports the given status. The operand word is
    /// reserved and written as zero.
    ///
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SyncCommand(pub u32): FromRaw, IntoRaw {

        /// 0x8
        pub opcode: u8 [Opcode] @ 28..=31,

        /// Raise RISCI when the status is reached
        pub irq: bool @ 24,

        /// Status bits to clear
        pub status_reset: u8 @ 20..=23,

        /// Status bits to set
        pub status_set: u8 @ 16..=19,

        /// Discard FIFO contents until the status arrives, instead of
        /// flagging a sync error
        pub resync: bool @ 15,

        /// Status to wait for
        pub fifo_status: u8 [FifoStatus] @ 0..=3,

    }

}

/// FIFO status codes
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum FifoStatus {

    /// Pixel data
    #[default]
    PixelData = 0x0,

    /// Start of line
    StartOfLine = 0x2,

    /// Vertical resync after an even field; the odd field follows
    VerticalResyncEven = 0x4,

    /// First data of a packed-format field
    FirstPacked = 0x6,

    /// Vertical resync after an odd field; the even field follows
    VerticalResyncOdd = 0xc,

    /// First data of a planar-format field
    FirstPlanar = 0xe,

}

// eof
