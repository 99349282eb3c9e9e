// SPDX-License-Identifier: GPL-3.0-or-later

//! RISC Instruction - Skip

use proc_bitfield::bitfield;

use super::Opcode;

bitfield! {

    /// Drop bytes from the FIFO without storing them. No operand.
    ///
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SkipCommand(pub u32): FromRaw, IntoRaw {

        /// 0x2
        pub opcode: u8 [Opcode] @ 28..=31,

        /// First span of a scanline
        pub sol: bool @ 27,

        /// Last span of a scanline
        pub eol: bool @ 26,

        /// Raise RISCI when the instruction completes
        pub irq: bool @ 24,

        /// Status bits to clear
        pub status_reset: u8 @ 20..=23,

        /// Status bits to set
        pub status_set: u8 @ 16..=19,

        /// Bytes to drop
        pub byte_count: u16 @ 0..=11,

    }

}

// eof
