// SPDX-License-Identifier: GPL-3.0-or-later

//! Interrupt servicing
//!
//! RISCI tells which program just jumped back into the jump table through the
//! status nibble its jump left behind. The sequencer faults are split in two:
//! sync errors and FIFO overruns leave the sequencer out of step with the
//! video, so DMA is restarted from the top of the jump table; the others are
//! bus-level trouble that a restart would not fix, and are only reported.

use log::{debug, trace, warn};

use crate::dev::bt848::{DmaControl, GPIO_DMA_CTL, INT_MASK, INT_STAT, INT_STAT_W1C_MASK, IntStatus};
use crate::dev::dma::DmaMemory;
use crate::dev::reg::RegisterIo;
use crate::dev::risc::RiscStatus;
use crate::device::{Digitizer, State};

/// Most status reads per interrupt before giving up on a stuck source
pub const MAX_IRQ_PASSES: usize = 10;

/// What one call to [`Digitizer::handle_irq`] did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IrqOutcome {

    /// Status reads that found something to service
    pub passes: usize,

    pub frame_starts: usize,

    pub grabs_completed: usize,

    pub overlay_frames: usize,

    pub vbi_frames: usize,

    /// DMA restarts after SCERR or FBUS
    pub resyncs: usize,

    /// Parity, abort and opcode errors
    pub faults: usize,

    /// Status was still pending after [`MAX_IRQ_PASSES`] passes
    pub saturated: bool,

}

impl IrqOutcome {

    /// Whether the interrupt was ours
    #[inline]
    pub fn handled(&self) -> bool {
        self.passes > 0
    }

}

/// Faults that only get reported
fn bus_faults(stat: IntStatus) -> bool {
    stat.ocerr() || stat.pabort() || stat.riperr() || stat.pperr()
}

impl<R, M> Digitizer<R, M>
    where
        R: RegisterIo,
        M: DmaMemory,
{

    /// Services the card's interrupt line
    pub fn handle_irq(&self) -> IrqOutcome {
        let mut outcome = IrqOutcome::default();
        let mut state = self.state.lock();

        for _ in 0..MAX_IRQ_PASSES {
            let stat: IntStatus = self.regs.read_as(INT_STAT);
            let raw = u32::from(stat);
            let active = IntStatus(raw & self.regs.read(INT_MASK) & INT_STAT_W1C_MASK);
            if u32::from(active) == 0 {
                return outcome;
            }
            self.regs.write(INT_STAT, raw & INT_STAT_W1C_MASK);
            outcome.passes += 1;
            trace!("irq: stat {:#010x} active {:#010x}", raw, u32::from(active));

            if active.risci() {
                self.risc_event(&mut state, RiscStatus::from_bits_truncate(stat.riscs()), &mut outcome);
            }
            if active.scerr() || active.fbus() {
                self.resync(&mut state, active);
                outcome.resyncs += 1;
            }
            if bus_faults(active) {
                warn!(
                    "sequencer fault:{}{}{}{}",
                    if active.ocerr() { " bad opcode" } else { "" },
                    if active.pabort() { " bus abort" } else { "" },
                    if active.riperr() { " instruction parity" } else { "" },
                    if active.pperr() { " data parity" } else { "" },
                );
                outcome.faults += 1;
            }
        }

        warn!("interrupt status still pending after {} passes", MAX_IRQ_PASSES);
        outcome.saturated = true;
        outcome
    }

    fn risc_event(&self, state: &mut State, tags: RiscStatus, outcome: &mut IrqOutcome) {
        // The first interrupt after a retire may have been raised before it,
        // from inside the retired program. The second was raised after the
        // sequencer went through the table again.
        state.risc_irqs += 1;
        let now = state.risc_irqs;
        state.retired.retain(|(unlinked, _)| now < unlinked + 2);

        if tags.contains(RiscStatus::VBI) {
            outcome.vbi_frames += 1;
        }
        if tags.contains(RiscStatus::OVERLAY) {
            outcome.overlay_frames += 1;
        }
        if tags.contains(RiscStatus::GRAB) {
            self.grab_done(state);
            outcome.grabs_completed += 1;
        }
        if tags.contains(RiscStatus::FRAME_START) {
            self.frame_start(state);
            outcome.frame_starts += 1;
        }
    }

    /// The loop slot fired: start the oldest queued grab on this frame
    fn frame_start(&self, state: &mut State) {
        self.table.arm_frame_start(false);
        if state.grabs.active().is_some() {
            return;
        }
        let Some(request) = state.grabs.start_next().map(|grab| grab.request) else {
            return;
        };
        self.program_capture(state);
        self.relink(state);
        debug!("grab {} started: {:?} {}x{}", request.buffer, request.format, request.width, request.height);
    }

    /// A grab program finished its last field
    fn grab_done(&self, state: &mut State) {
        let Some(buffer) = state.grabs.complete_active() else {
            warn!("grab interrupt with no grab in progress");
            return;
        };
        self.program_capture(state);
        self.relink(state);
        if let Some(programs) = state.grabs.take_programs(buffer) {
            self.retire(state, programs);
        }
        if state.grabs.has_pending() {
            self.table.arm_frame_start(true);
        }
        self.done.notify_all();
        self.update_dma(state);
        debug!("grab {} done", buffer);
    }

    /// Restarts the sequencer from the top of the jump table
    fn resync(&self, state: &mut State, stat: IntStatus) {
        warn!(
            "{}, restarting DMA",
            if stat.scerr() { "sync error" } else { "FIFO overrun" },
        );
        if state.running {
            self.regs.write_as(GPIO_DMA_CTL, DmaControl(0));
            state.retired.clear();
            self.start_dma();
        }
        state.resyncs += 1;
        self.done.notify_all();
    }

}

#[cfg(test)]
mod tests {

    use std::sync::Arc;

    use super::*;
    use crate::config::CardConfig;
    use crate::dev::dma::HostDma;
    use crate::dev::reg::RegisterBank;

    /// A status register that ignores acknowledgement
    struct StuckBank(RegisterBank);

    impl RegisterIo for StuckBank {

        fn read(&self, offset: usize) -> u32 {
            self.0.read(offset)
        }

        fn write(&self, offset: usize, value: u32) {
            if offset != INT_STAT {
                self.0.write(offset, value)
            }
        }

    }

    #[test]
    fn foreign_interrupts_are_not_ours() {
        let regs = Arc::new(RegisterBank::new());
        let dev = Digitizer::new(regs.clone(), HostDma::new(0x1000), CardConfig::default()).unwrap();
        // VSYNC is not unmasked
        regs.raise(INT_STAT, IntStatus(0).with_vsync(true).into());
        let outcome = dev.handle_irq();
        assert!(!outcome.handled());
        assert!(IntStatus(regs.read(INT_STAT)).vsync());
    }

    #[test]
    fn sync_errors_restart_dma() {
        let regs = Arc::new(RegisterBank::new());
        let dev = Digitizer::new(regs.clone(), HostDma::new(0x1000), CardConfig::default()).unwrap();
        dev.enable_vbi(true).unwrap();
        regs.raise(INT_STAT, IntStatus(0).with_scerr(true).with_pabort(true).into());
        let outcome = dev.handle_irq();
        assert_eq!(outcome.passes, 1);
        assert_eq!(outcome.resyncs, 1);
        assert_eq!(outcome.faults, 1);
        assert_eq!(dev.resyncs(), 1);
        assert_eq!(regs.read(GPIO_DMA_CTL), 0b11);
        assert_eq!(regs.read(INT_STAT) & INT_STAT_W1C_MASK, 0);
    }

    #[test]
    fn stuck_status_is_bounded() {
        let regs = StuckBank(RegisterBank::new());
        regs.0.raise(INT_STAT, IntStatus(0).with_riperr(true).into());
        let dev = Digitizer::new(regs, HostDma::new(0x1000), CardConfig::default()).unwrap();
        let outcome = dev.handle_irq();
        assert!(outcome.saturated);
        assert_eq!(outcome.passes, MAX_IRQ_PASSES);
        assert_eq!(outcome.faults, MAX_IRQ_PASSES);
    }

}

// eof
