// SPDX-License-Identifier: GPL-3.0-or-later

//! RISC Instruction - Write

use proc_bitfield::bitfield;

use super::Opcode;

bitfield! {

    /// Move bytes from the FIFO to memory. The operand word is the bus
    /// address of the first byte.
    ///
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct WriteCommand(pub u32): FromRaw, IntoRaw {

        /// 0x1
        pub opcode: u8 [Opcode] @ 28..=31,

        /// First transfer of a scanline
        pub sol: bool @ 27,

        /// Last transfer of a scanline
        pub eol: bool @ 26,

        /// Raise RISCI when the instruction completes
        pub irq: bool @ 24,

        /// Status bits to clear
        pub status_reset: u8 @ 20..=23,

        /// Status bits to set
        pub status_set: u8 @ 16..=19,

        /// Which bytes of each dword are stored
        pub byte_enables: u8 @ 12..=15,

        /// Bytes to transfer
        pub byte_count: u16 @ 0..=11,

    }

}

// eof
