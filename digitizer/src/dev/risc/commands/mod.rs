// SPDX-License-Identifier: GPL-3.0-or-later

//! Raw definition of RISC instructions (as bit fields, enums, and associated constants).
//!
//! Every instruction starts with a command word whose top nibble is the
//! opcode. WRITE, JUMP and SYNC are followed by one operand word; SKIP is a
//! single word. These modules describe the words; they do not check that a
//! sequence of them makes a sensible program.
//!
//! Documentation:
//!     - Bt848 data sheet, "RISC Instructions" and "RISC Program Examples"
//!

use num_enum::{FromPrimitive, IntoPrimitive};

pub mod jump;
pub mod skip;
pub mod sync;
pub mod write;

/// Instruction opcodes, bits 31:28 of the command word
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Opcode {

    /// Transfer `count` bytes from the FIFO to the operand address
    Write = 0x1,

    /// Discard `count` bytes from the FIFO
    Skip = 0x2,

    /// Continue the previous WRITE's transfer
    WriteContinue = 0x5,

    /// Continue fetching at the operand address
    Jump = 0x7,

    /// Wait for the FIFO to reach a given status
    Sync = 0x8,

    /// Planar write, three targets
    Write123 = 0x9,

    /// Planar skip
    Skip123 = 0xa,

    /// Planar write with the first target skipped
    Write1S23 = 0xb,

    /// Anything the sequencer would reject
    #[default]
    Invalid = 0x0,

}

impl Opcode {

    /// Words the instruction occupies, command word included
    pub const fn words(&self) -> usize {
        match *self {
            Self::Skip | Self::WriteContinue => 1,
            Self::Write | Self::Jump | Self::Sync => 2,
            Self::Skip123 => 2,
            Self::Write1S23 => 3,
            Self::Write123 => 4,
            Self::Invalid => 1,
        }
    }

}

/// Largest byte count a WRITE or SKIP can carry
pub const MAX_BYTE_COUNT: u16 = 0x0fff;

/// Byte enables for a WRITE that stores every byte
pub const ALL_BYTES: u8 = 0b1111;

// eof
