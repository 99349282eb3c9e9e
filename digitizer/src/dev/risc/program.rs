// SPDX-License-Identifier: GPL-3.0-or-later

//! Assembling, publishing and reading back RISC programs
//!
//! A program is assembled in ordinary memory by a [`ProgramBuilder`] and only
//! copied into DMA memory once it is complete. Nothing ever edits a published
//! [`MicroProgram`]; a new pair is built and the jump table is pointed at it.

use log::trace;

use crate::dev::dma::{DmaMemory, DmaRegion};
use crate::error::{CaptureError, Result};

use super::RiscStatus;
use super::commands::{ALL_BYTES, Opcode};
use super::commands::jump::JumpCommand;
use super::commands::skip::SkipCommand;
use super::commands::sync::{FifoStatus, SyncCommand};
use super::commands::write::WriteCommand;

/// One half of an interlaced frame
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Odd,
    Even,
}

impl Field {

    /// The field whose end also ends the frame: the even field when both are
    /// captured, else the odd field, which then carries every line.
    #[inline]
    pub fn completing(interlaced: bool) -> Field {
        // The table runs the odd slots, then the even ones, then loops.
        if interlaced { Field::Even } else { Field::Odd }
    }

    /// Output lines of a `height`-line capture that this field's program writes
    pub fn lines(self, height: u32, interlaced: bool) -> impl Iterator<Item = u32> {
        let (start, step, end) = match (self, interlaced) {
            (Field::Odd, true) => (0, 2, height),
            (Field::Even, true) => (1, 2, height),
            (Field::Odd, false) => (0, 1, height),
            (Field::Even, false) => (0, 1, 0),
        };
        (start..end).step_by(step)
    }

}

/// Where each field's program returns to when it is done
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Linkage {
    pub odd_return: u32,
    pub even_return: u32,
}

impl Linkage {

    #[inline]
    pub fn return_for(&self, field: Field) -> u32 {
        match field {
            Field::Odd => self.odd_return,
            Field::Even => self.even_return,
        }
    }

}

/// A decoded instruction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    Write { sol: bool, eol: bool, len: u16, addr: u32 },
    Skip { sol: bool, eol: bool, len: u16 },
    Jump { target: u32, irq: bool, status: RiscStatus },
    Sync { status: FifoStatus, resync: bool },
}

impl Instruction {

    /// Decodes the instruction at the front of `words`, returning it and the
    /// number of words it takes. `None` for a truncated or unknown instruction.
    pub fn decode(words: &[u32]) -> Option<(Instruction, usize)> {
        let command = *words.first()?;
        let opcode = Opcode::from((command >> 28) as u8);
        let operand = || words.get(1).copied();
        let instruction = match opcode {
            Opcode::Write => {
                let cmd = WriteCommand(command);
                Instruction::Write {
                    sol: cmd.sol(),
                    eol: cmd.eol(),
                    len: cmd.byte_count(),
                    addr: operand()?,
                }
            }
            Opcode::Skip => {
                let cmd = SkipCommand(command);
                Instruction::Skip { sol: cmd.sol(), eol: cmd.eol(), len: cmd.byte_count() }
            }
            Opcode::Jump => {
                let cmd = JumpCommand(command);
                Instruction::Jump {
                    target: operand()?,
                    irq: cmd.irq(),
                    status: RiscStatus::from_bits_truncate(cmd.status_set()),
                }
            }
            Opcode::Sync => {
                let cmd = SyncCommand(command);
                operand()?;
                Instruction::Sync { status: cmd.fifo_status(), resync: cmd.resync() }
            }
            _ => return None,
        };
        Some((instruction, opcode.words()))
    }

}

/// Assembles one field's program.
///
/// Words are collected in host memory; [`finish`](Self::finish) checks them
/// against the word limit and only then copies them into DMA memory.
pub struct ProgramBuilder {
    words: Vec<u32>,
    limit: usize,
}

impl ProgramBuilder {

    pub fn new(limit: usize) -> Self {
        ProgramBuilder { words: Vec::new(), limit }
    }

    /// Words emitted so far
    #[inline]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Store `len` bytes at bus address `addr`
    pub fn write(&mut self, sol: bool, eol: bool, len: u16, addr: u32) {
        let cmd = WriteCommand(0)
            .with_opcode(Opcode::Write)
            .with_sol(sol)
            .with_eol(eol)
            .with_byte_enables(ALL_BYTES)
            .with_byte_count(len);
        self.words.push(cmd.into());
        self.words.push(addr);
    }

    /// Drop `len` bytes
    pub fn skip(&mut self, sol: bool, eol: bool, len: u16) {
        let cmd = SkipCommand(0)
            .with_opcode(Opcode::Skip)
            .with_sol(sol)
            .with_eol(eol)
            .with_byte_count(len);
        self.words.push(cmd.into());
    }

    /// Continue at `target`. A tagged jump raises RISCI, sets its tag and
    /// resets every other status bit.
    pub fn jump(&mut self, target: u32, tag: Option<RiscStatus>) {
        self.words.push(jump_command(tag).into());
        self.words.push(target);
    }

    /// Wait for the FIFO to report `status`
    pub fn sync(&mut self, status: FifoStatus, resync: bool) {
        let cmd = SyncCommand(0)
            .with_opcode(Opcode::Sync)
            .with_resync(resync)
            .with_fifo_status(status);
        self.words.push(cmd.into());
        self.words.push(0);
    }

    /// Copies the program into DMA memory
    pub fn finish<M>(self, mem: &M) -> Result<MicroProgram>
        where
            M: DmaMemory + ?Sized,
    {
        if self.words.len() > self.limit {
            return Err(CaptureError::ProgramTooLarge { words: self.words.len(), limit: self.limit });
        }
        let region = mem.alloc(self.words.len())?;
        for (i, word) in self.words.iter().enumerate() {
            region.store(i, *word);
        }
        trace!("published {} program words at {:#010x}", self.words.len(), region.bus_address());
        Ok(MicroProgram { region })
    }

}

/// The command word of a jump, tagged or not
pub fn jump_command(tag: Option<RiscStatus>) -> JumpCommand {
    let cmd = JumpCommand(0).with_opcode(Opcode::Jump);
    match tag {
        Some(tag) => cmd
            .with_irq(true)
            .with_status_set(tag.bits())
            .with_status_reset(tag.others().bits()),
        None => cmd,
    }
}

/// A complete program in DMA memory
pub struct MicroProgram {
    region: DmaRegion,
}

impl MicroProgram {

    /// Entry point
    #[inline]
    pub fn bus_address(&self) -> u32 {
        self.region.bus_address()
    }

    /// Length in words
    #[inline]
    pub fn len(&self) -> usize {
        self.region.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }

    pub fn words(&self) -> Vec<u32> {
        self.region.snapshot()
    }

    /// Decodes the whole program; stops at the first word that does not decode
    pub fn instructions(&self) -> Vec<Instruction> {
        let words = self.words();
        let mut out = Vec::new();
        let mut at = 0;
        while let Some((instruction, size)) = Instruction::decode(&words[at..]) {
            out.push(instruction);
            at += size;
        }
        out
    }

}

/// Bus addresses the jump table vectors to for one kind of program
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryPoints {
    pub odd: u32,
    pub even: u32,
}

/// The two programs of one capture, one per field
pub struct ProgramPair {
    pub odd: MicroProgram,
    pub even: MicroProgram,
}

impl ProgramPair {

    pub fn entry_points(&self) -> EntryPoints {
        EntryPoints {
            odd: self.odd.bus_address(),
            even: self.even.bus_address(),
        }
    }

    #[inline]
    pub fn field(&self, field: Field) -> &MicroProgram {
        match field {
            Field::Odd => &self.odd,
            Field::Even => &self.even,
        }
    }

}


// eof
