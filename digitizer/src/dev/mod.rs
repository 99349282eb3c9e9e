// SPDX-License-Identifier: GPL-3.0-or-later

//! Module supporting access to and control of the digitizer

pub mod bt848;
pub mod dma;
pub mod reg;
pub mod risc;

// eof
