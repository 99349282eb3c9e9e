// SPDX-License-Identifier: GPL-3.0-or-later

//! A software stand-in for the RISC sequencer
//!
//! Runs the programs in a [`HostDma`] against a [`RegisterBank`] one frame at
//! a time, the way the chip would: fetching instructions by bus address,
//! keeping the status nibble, raising RISCI for flagged jumps. The caller
//! supplies the interrupt handler, which runs as soon as the interrupt is
//! raised, before the next instruction is fetched.

use thiserror::Error;

use crate::dev::bt848::{DmaControl, GPIO_DMA_CTL, INT_STAT, IntStatus, RISC_STRT_ADD};
use crate::dev::dma::{BufferId, HostDma};
use crate::dev::reg::{RegisterBank, RegisterIo};
use crate::dev::risc::RiscStatus;
use crate::dev::risc::commands::jump::JumpCommand;
use crate::dev::risc::commands::sync::FifoStatus;
use crate::dev::risc::program::Instruction;

/// Instructions one frame may take before the program is taken to loop
const MAX_STEPS: usize = 1 << 20;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimFault {

    #[error("DMA is off")]
    Stopped,

    #[error("no instruction at {0:#010x}")]
    BadFetch(u32),

    #[error("no end of frame after {0} instructions")]
    Runaway(usize),

}

/// One WRITE the sequencer performed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteRecord {
    pub bus: u32,
    pub len: u16,
    pub sol: bool,
    pub eol: bool,

    /// The capture buffer written, if any
    pub target: Option<(BufferId, usize)>,
}

/// Everything one frame did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameTrace {
    pub writes: Vec<WriteRecord>,
    pub skipped: usize,
    pub syncs: Vec<FifoStatus>,

    /// Tags of the interrupts raised, in order
    pub irqs: Vec<RiscStatus>,

    /// DMA was switched off before the frame ended
    pub stopped: bool,
}

impl FrameTrace {

    /// Bytes written into `buffer`
    pub fn bytes_into(&self, buffer: BufferId) -> usize {
        self.writes
            .iter()
            .filter(|w| matches!(w.target, Some((b, _)) if b == buffer))
            .map(|w| w.len as usize)
            .sum()
    }

    /// Whole scanlines written, wherever they went
    pub fn lines(&self) -> usize {
        self.writes.iter().filter(|w| w.eol).count()
    }

}

/// The simulated sequencer
pub struct Sequencer<'a> {
    regs: &'a RegisterBank,
    mem: &'a HostDma,
}

impl<'a> Sequencer<'a> {

    pub fn new(regs: &'a RegisterBank, mem: &'a HostDma) -> Self {
        Sequencer { regs, mem }
    }

    fn running(&self) -> bool {
        self.regs.read_as::<DmaControl>(GPIO_DMA_CTL).risc_enable()
    }

    fn fetch(&self, bus: u32) -> Result<u32, SimFault> {
        self.mem.read_word(bus).ok_or(SimFault::BadFetch(bus))
    }

    /// Latches a jump's status bits into the status nibble
    fn latch_status(&self, cmd: JumpCommand) {
        let stat: IntStatus = self.regs.read_as(INT_STAT);
        let riscs = (stat.riscs() & !cmd.status_reset()) | cmd.status_set();
        self.regs.force(INT_STAT, stat.with_riscs(riscs & 0xf).into());
    }

    /// Raises status bits as the chip would, for fault injection
    pub fn raise(&self, stat: IntStatus) {
        self.regs.raise(INT_STAT, stat.into());
    }

    /// Runs from the start address through to the jump back to it, calling
    /// `on_irq` after every interrupting jump
    pub fn run_frame<F>(&self, mut on_irq: F) -> Result<FrameTrace, SimFault>
        where
            F: FnMut(),
    {
        if !self.running() {
            return Err(SimFault::Stopped);
        }
        let start = self.regs.read(RISC_STRT_ADD);
        let mut trace = FrameTrace::default();
        let mut pc = start;

        for _ in 0..MAX_STEPS {
            if !self.running() {
                trace.stopped = true;
                return Ok(trace);
            }
            let command = self.fetch(pc)?;
            let operand = self.mem.read_word(pc + 4).unwrap_or(0);
            let (instruction, words) =
                Instruction::decode(&[command, operand]).ok_or(SimFault::BadFetch(pc))?;
            if words == 2 {
                self.fetch(pc + 4)?;
            }
            let next = pc + 4 * words as u32;

            match instruction {
                Instruction::Write { sol, eol, len, addr } => {
                    trace.writes.push(WriteRecord { bus: addr, len, sol, eol, target: self.mem.locate(addr) });
                    pc = next;
                }
                Instruction::Skip { len, .. } => {
                    trace.skipped += len as usize;
                    pc = next;
                }
                Instruction::Sync { status, .. } => {
                    trace.syncs.push(status);
                    pc = next;
                }
                Instruction::Jump { target, irq, status } => {
                    self.latch_status(JumpCommand(command));
                    if irq {
                        self.regs.raise(INT_STAT, IntStatus(0).with_risci(true).into());
                        trace.irqs.push(status);
                        on_irq();
                    }
                    if target == start {
                        return Ok(trace);
                    }
                    pc = target;
                }
            }
        }
        Err(SimFault::Runaway(MAX_STEPS))
    }

}


// eof
