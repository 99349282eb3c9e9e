// SPDX-License-Identifier: GPL-3.0-or-later

//! Module supporting construction of RISC sequencer programs

pub mod commands;
pub mod program;

use bitflags::bitflags;

bitflags! {

    /// The four status bits a RISC instruction can set or reset. They show
    /// up in the top nibble of the interrupt status register and tell the
    /// interrupt handler which program raised RISCI.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct RiscStatus: u8 {
        const VBI = 0x1;
        const GRAB = 0x2;
        const OVERLAY = 0x4;
        const FRAME_START = 0x8;
    }

}

impl RiscStatus {

    /// Bits to reset so that `self` is the only tag left standing
    #[inline]
    pub fn others(self) -> RiscStatus {
        self.complement()
    }

}

// eof
