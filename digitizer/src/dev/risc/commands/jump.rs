// SPDX-License-Identifier: GPL-3.0-or-later

//! RISC Instruction - Jump

use proc_bitfield::bitfield;

use super::Opcode;

bitfield! {

    /// Continue at the bus address in the operand word.
    ///
    /// A jump is fetched as a unit: the sequencer reads the command and the
    /// operand in one burst, so rewriting only the operand is safe while it
    /// runs.
    ///
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct JumpCommand(pub u32): FromRaw, IntoRaw {

        /// 0x7
        pub opcode: u8 [Opcode] @ 28..=31,

        /// Raise RISCI when the jump is taken
        pub irq: bool @ 24,

        /// Status bits to clear
        pub status_reset: u8 @ 20..=23,

        /// Status bits to set
        pub status_set: u8 @ 16..=19,

    }

}

// eof
