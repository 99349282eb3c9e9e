// SPDX-License-Identifier: GPL-3.0-or-later

//! The capture controller
//!
//! One [`Digitizer`] owns a card: its registers, its jump table and every
//! program linked into it. All state sits behind one mutex, held while
//! programs are compiled, so a program is published and linked in one step
//! or not at all. Programs that were linked are not freed when replaced; they
//! are kept until the sequencer is known to have left them, which is the next
//! RISC interrupt or DMA being switched off.

use log::{debug, info};
use parking_lot::{Condvar, Mutex};

use crate::clip::{ClipRect, FrameBuffer, MAX_CLIPS, compile_clip_program};
use crate::config::CardConfig;
use crate::dev::bt848::{
    ADELAY, BDELAY, CAP_CTL, COLOR_CTL, COLOR_FMT, CaptureControl, DmaControl, GPIO_DMA_CTL, IFORM,
    INT_MASK, INT_STAT, INT_STAT_W1C_MASK, InputFormat, IntStatus, RISC_STRT_ADD, VBI_PACK_SIZE,
    default_interrupt_mask,
};
use crate::dev::dma::{BufferId, DmaMemory};
use crate::dev::reg::RegisterIo;
use crate::dev::risc::program::ProgramPair;
use crate::error::{CaptureError, Result};
use crate::format::PixelFormat;
use crate::geometry::{CaptureWindow, Geometry, plan_geometry};
use crate::grab::{GRAB_BUFFERS, GrabQueue, GrabRequest, PreparedGrab, SlotState};
use crate::jump::JumpTable;
use crate::norm::{Norm, TuningStandard};
use crate::raw::{compile_raw_program, compile_vbi_program};

/// Overlay window size until one is set
const DEFAULT_WIDTH: u32 = 320;
const DEFAULT_HEIGHT: u32 = 240;

pub(crate) struct State {

    /// The overlay window
    pub(crate) window: CaptureWindow,

    /// `window`, planned
    pub(crate) geometry: Geometry,

    pub(crate) framebuffer: Option<FrameBuffer>,

    pub(crate) clips: Vec<ClipRect>,

    pub(crate) capture_enabled: bool,

    /// Compiled overlay pair, present while overlay is enabled
    pub(crate) overlay: Option<ProgramPair>,

    /// Compiled VBI pair, present while VBI capture is enabled
    pub(crate) vbi: Option<ProgramPair>,

    pub(crate) grabs: GrabQueue,

    /// Unlinked programs the sequencer may still be running, with the
    /// value of `risc_irqs` when each was unlinked
    pub(crate) retired: Vec<(u64, ProgramPair)>,

    /// RISC interrupts handled so far
    pub(crate) risc_irqs: u64,

    /// DMA is enabled
    pub(crate) running: bool,

    pub(crate) resyncs: u64,

}

/// A video digitizer card
pub struct Digitizer<R, M>
    where
        R: RegisterIo,
        M: DmaMemory,
{
    pub(crate) regs: R,
    pub(crate) mem: M,
    pub(crate) config: CardConfig,
    pub(crate) table: JumpTable,
    pub(crate) state: Mutex<State>,
    pub(crate) done: Condvar,
}

impl<R, M> Digitizer<R, M>
    where
        R: RegisterIo,
        M: DmaMemory,
{

    /// Takes over a card: builds the jump table, programs the configured
    /// standard and unmasks the interrupts the controller services. DMA stays
    /// off until something is enabled or submitted.
    pub fn new(regs: R, mem: M, config: CardConfig) -> Result<Self> {
        config.validate()?;
        let table = JumpTable::new(&mem)?;
        let window = CaptureWindow::new(DEFAULT_WIDTH, DEFAULT_HEIGHT, PixelFormat::Rgb565, config.norm);
        let geometry = plan_geometry(&window, config.norm.standard())?;

        regs.write_as(GPIO_DMA_CTL, DmaControl(0));
        regs.write_as(INT_MASK, IntStatus(0));
        regs.write(INT_STAT, INT_STAT_W1C_MASK);
        regs.write(RISC_STRT_ADD, table.bus_address());

        let dev = Digitizer {
            regs,
            mem,
            config,
            table,
            state: Mutex::new(State {
                window,
                geometry,
                framebuffer: None,
                clips: Vec::new(),
                capture_enabled: false,
                overlay: None,
                vbi: None,
                grabs: GrabQueue::new(),
                retired: Vec::new(),
                risc_irqs: 0,
                running: false,
                resyncs: 0,
            }),
            done: Condvar::new(),
        };
        dev.write_norm(dev.config.norm.standard());
        {
            let state = dev.state.lock();
            dev.program_capture(&state);
        }
        dev.regs.write_as(INT_MASK, default_interrupt_mask());
        info!("digitizer up, {}, jump table at {:#010x}", dev.config.norm.standard().name, dev.table.bus_address());

        if dev.config.vbi_on_open {
            dev.enable_vbi(true)?;
        }
        Ok(dev)
    }

    #[inline]
    pub fn registers(&self) -> &R {
        &self.regs
    }

    #[inline]
    pub fn memory(&self) -> &M {
        &self.mem
    }

    #[inline]
    pub fn config(&self) -> &CardConfig {
        &self.config
    }

    #[inline]
    pub fn jump_table(&self) -> &JumpTable {
        &self.table
    }

    /// The overlay window, as planned
    pub fn geometry(&self) -> Geometry {
        self.state.lock().geometry
    }

    pub fn window(&self) -> CaptureWindow {
        self.state.lock().window
    }

    pub fn grab_state(&self, buffer: usize) -> SlotState {
        self.state.lock().grabs.state(buffer)
    }

    /// DMA is enabled
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Sequencer restarts after sync errors and FIFO overruns
    pub fn resyncs(&self) -> u64 {
        self.state.lock().resyncs
    }

    /// Switches the video standard. Refused while a grab is outstanding; the
    /// overlay, if enabled, is recompiled for the new raster first.
    pub fn set_norm(&self, norm: Norm) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(buffer) = (0..GRAB_BUFFERS).find(|b| state.grabs.state(*b).is_outstanding()) {
            return Err(CaptureError::Busy(buffer));
        }
        let window = CaptureWindow { norm, ..state.window };
        let geometry = plan_geometry(&window, norm.standard())?;
        let overlay = match state.capture_enabled {
            true => Some(self.compile_overlay(&state, &window, &geometry)?),
            false => None,
        };

        self.write_norm(norm.standard());
        state.window = window;
        state.geometry = geometry;
        self.replace_overlay(&mut state, overlay);
        info!("video standard now {}", norm.standard().name);
        Ok(())
    }

    /// Sets the overlay window. The returned geometry is what the card will
    /// actually produce.
    pub fn set_window(&self, window: CaptureWindow) -> Result<Geometry> {
        let mut state = self.state.lock();
        let window = CaptureWindow { norm: state.window.norm, ..window };
        let geometry = plan_geometry(&window, window.norm.standard())?;
        let overlay = match state.capture_enabled {
            true => Some(self.compile_overlay(&state, &window, &geometry)?),
            false => None,
        };
        state.window = window;
        state.geometry = geometry;
        self.replace_overlay(&mut state, overlay);
        Ok(geometry)
    }

    /// Sets the framebuffer the overlay is drawn into
    pub fn set_framebuffer(&self, framebuffer: FrameBuffer) -> Result<()> {
        let mut state = self.state.lock();
        let previous = state.framebuffer.replace(framebuffer);
        if state.capture_enabled {
            match self.compile_overlay(&state, &state.window, &state.geometry) {
                Ok(overlay) => self.replace_overlay(&mut state, Some(overlay)),
                Err(err) => {
                    state.framebuffer = previous;
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Replaces the clip list
    pub fn set_clips(&self, clips: &[ClipRect]) -> Result<()> {
        if clips.len() > MAX_CLIPS {
            return Err(CaptureError::ClipOverflow { count: clips.len() });
        }
        let mut state = self.state.lock();
        let previous = std::mem::replace(&mut state.clips, clips.to_vec());
        if state.capture_enabled {
            match self.compile_overlay(&state, &state.window, &state.geometry) {
                Ok(overlay) => self.replace_overlay(&mut state, Some(overlay)),
                Err(err) => {
                    state.clips = previous;
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Starts or stops the overlay
    pub fn enable_capture(&self, enable: bool) -> Result<()> {
        let mut state = self.state.lock();
        if enable == state.capture_enabled {
            return Ok(());
        }
        let overlay = match enable {
            true => Some(self.compile_overlay(&state, &state.window, &state.geometry)?),
            false => None,
        };
        state.capture_enabled = enable;
        self.replace_overlay(&mut state, overlay);
        self.update_dma(&mut state);
        info!("overlay {}", if enable { "on" } else { "off" });
        Ok(())
    }

    /// Starts or stops VBI capture. The capture slots are left alone.
    pub fn enable_vbi(&self, enable: bool) -> Result<()> {
        let mut state = self.state.lock();
        if enable == state.vbi.is_some() {
            return Ok(());
        }
        let vbi = match enable {
            true => Some(compile_vbi_program(&self.mem, self.table.vbi_linkage(), self.config.program_word_limit)?),
            false => None,
        };
        self.table.link_vbi(vbi.as_ref().map(ProgramPair::entry_points));
        if let Some(old) = std::mem::replace(&mut state.vbi, vbi) {
            self.retire(&mut state, old);
        }
        self.program_capture_control(&state);
        self.update_dma(&mut state);
        info!("vbi {}", if enable { "on" } else { "off" });
        Ok(())
    }

    /// Queues a grab of a `width` x `height` picture in `format` into grab
    /// buffer `buffer`. The grab starts at the next frame boundary once every
    /// grab submitted before it has completed.
    pub fn submit_grab(&self, buffer: usize, format: PixelFormat, width: u32, height: u32) -> Result<()> {
        if buffer >= GRAB_BUFFERS {
            return Err(CaptureError::Format(format!("no grab buffer {}", buffer)));
        }
        let mut state = self.state.lock();
        let window = CaptureWindow {
            crop: state.window.crop,
            ..CaptureWindow::new(width, height, format, state.window.norm)
        };
        let geometry = plan_geometry(&window, window.norm.standard())?;
        if !format.is_raw() && (geometry.width, geometry.height) != (width, height) {
            return Err(CaptureError::Format(format!(
                "a {}x{} grab does not fit the {}x{} crop box",
                width, height, geometry.crop.width, geometry.crop.height,
            )));
        }
        state.grabs.check_submit(buffer)?;

        let programs = compile_raw_program(
            &self.mem,
            format,
            &geometry,
            BufferId::Grab(buffer),
            self.table.capture_linkage(),
            self.config.program_word_limit,
        )?;
        let request = GrabRequest { buffer, format, width: geometry.width, height: geometry.height };
        if let Some(old) = state.grabs.push(PreparedGrab { request, geometry, programs }) {
            self.retire(&mut state, old.programs);
        }
        if state.grabs.active().is_none() {
            self.table.arm_frame_start(true);
        }
        self.update_dma(&mut state);
        debug!("grab {} submitted: {:?} {}x{}", buffer, format, geometry.width, geometry.height);
        Ok(())
    }

    /// Blocks until the grab in `buffer` completes, then hands the buffer
    /// back: its state returns to `Idle`.
    pub fn wait_grab(&self, buffer: usize) -> Result<()> {
        let mut state = self.state.lock();
        while !state.grabs.reap(buffer)? {
            self.done.wait(&mut state);
        }
        debug!("grab {} reaped", buffer);
        Ok(())
    }

    fn compile_overlay(&self, state: &State, window: &CaptureWindow, geometry: &Geometry) -> Result<ProgramPair> {
        let framebuffer = state.framebuffer
            .ok_or_else(|| CaptureError::Format("overlay needs a framebuffer".into()))?;
        compile_clip_program(
            &self.mem,
            window,
            geometry,
            &framebuffer,
            &state.clips,
            self.table.capture_linkage(),
            self.config.program_word_limit,
        )
    }

    /// Installs a new overlay pair (or none) and retires the old one. While a
    /// grab owns the capture slots, only the bookkeeping changes.
    fn replace_overlay(&self, state: &mut State, overlay: Option<ProgramPair>) {
        let old = std::mem::replace(&mut state.overlay, overlay);
        if state.grabs.active().is_none() {
            self.program_capture(state);
        }
        self.relink(state);
        if let Some(old) = old {
            self.retire(state, old);
        }
    }

    fn write_norm(&self, standard: &TuningStandard) {
        let current: InputFormat = self.regs.read_as(IFORM);
        let iform = InputFormat(standard.iform as u32)
            .with_muxsel(current.muxsel())
            .with_hactive(current.hactive());
        self.regs.write_as(IFORM, iform);
        self.regs.write(ADELAY, standard.adelay as u32);
        self.regs.write(BDELAY, standard.bdelay as u32);
        self.regs.write(VBI_PACK_SIZE, standard.vbi_pack as u32);
        debug!(
            "{}: {} samples per line from a {} Hz crystal",
            standard.name, standard.total_width, standard.fsc,
        );
    }

    /// Points the capture slots at whatever owns them now: the active grab,
    /// else the overlay, else nothing. VBI slots follow the VBI pair.
    pub(crate) fn relink(&self, state: &State) {
        let capture = match state.grabs.active_grab() {
            Some(grab) => Some(grab.programs.entry_points()),
            None if state.capture_enabled => state.overlay.as_ref().map(ProgramPair::entry_points),
            None => None,
        };
        self.table.link_capture(capture);
        self.table.link_vbi(state.vbi.as_ref().map(ProgramPair::entry_points));
    }

    /// Writes scaler and pixel format registers for whatever owns the
    /// capture slots
    pub(crate) fn program_capture(&self, state: &State) {
        let (geometry, format) = match state.grabs.active_grab() {
            Some(grab) => (grab.geometry, grab.request.format),
            None => (state.geometry, state.window.format),
        };
        geometry.write(&self.regs);
        self.regs.write_as(COLOR_FMT, format.color_format());
        self.regs.write_as(COLOR_CTL, format.color_control(self.config.gamma));
        self.program_capture_control(state);
    }

    fn program_capture_control(&self, state: &State) {
        let (interlaced, capturing) = match state.grabs.active_grab() {
            Some(grab) => (grab.geometry.interlaced || grab.request.format.is_raw(), true),
            None => (state.geometry.interlaced, state.capture_enabled),
        };
        let vbi = state.vbi.is_some();
        let control = CaptureControl(0)
            .with_odd(capturing)
            .with_even(capturing && interlaced)
            .with_vbi_odd(vbi)
            .with_vbi_even(vbi);
        self.regs.write_as(CAP_CTL, control);
    }

    /// Turns DMA on while anything needs it and off once nothing does
    pub(crate) fn update_dma(&self, state: &mut State) {
        let wanted = state.capture_enabled || state.vbi.is_some() || state.grabs.outstanding() > 0;
        match (wanted, state.running) {
            (true, false) => {
                self.start_dma();
                state.running = true;
                debug!("dma on");
            }
            (false, true) => {
                self.regs.write_as(GPIO_DMA_CTL, DmaControl(0));
                self.table.arm_frame_start(false);
                state.running = false;
                state.retired.clear();
                debug!("dma off");
            }
            _ => {}
        }
    }

    pub(crate) fn start_dma(&self) {
        self.regs.write(RISC_STRT_ADD, self.table.bus_address());
        self.regs.write_as(GPIO_DMA_CTL, DmaControl(0).with_risc_enable(true).with_fifo_enable(true));
    }

    /// Keeps an unlinked pair alive until the sequencer cannot be in it
    pub(crate) fn retire(&self, state: &mut State, programs: ProgramPair) {
        if state.running {
            state.retired.push((state.risc_irqs, programs));
        }
    }

}

impl<R, M> Drop for Digitizer<R, M>
    where
        R: RegisterIo,
        M: DmaMemory,
{
    fn drop(&mut self) {
        self.regs.write_as(GPIO_DMA_CTL, DmaControl(0));
        self.regs.write_as(INT_MASK, IntStatus(0));
        self.regs.write(INT_STAT, INT_STAT_W1C_MASK);
    }
}

#[cfg(test)]
mod tests {

    use std::sync::Arc;

    use super::*;
    use crate::dev::bt848::{E_HACTIVE_LO, ODD_BANK};
    use crate::dev::dma::HostDma;
    use crate::dev::reg::RegisterBank;
    use crate::jump::Slot;

    type Card = Digitizer<Arc<RegisterBank>, Arc<HostDma>>;

    fn card() -> (Card, Arc<RegisterBank>, Arc<HostDma>) {
        let regs = Arc::new(RegisterBank::new());
        let mem = Arc::new(HostDma::new(0x208000));
        let dev = Digitizer::new(regs.clone(), mem.clone(), CardConfig::default()).unwrap();
        (dev, regs, mem)
    }

    fn screen() -> FrameBuffer {
        FrameBuffer { base: 0x4000_0000, width: 1024, height: 768, bytes_per_line: 4096 }
    }

    #[test]
    fn opening_programs_the_standard() {
        let (dev, regs, _) = card();
        let standard = Norm::PalBdghi.standard();
        assert_eq!(regs.read(IFORM) & 0x1f, standard.iform as u32);
        assert_eq!(regs.read(ADELAY), 0x7f);
        assert_eq!(regs.read(RISC_STRT_ADD), dev.jump_table().bus_address());
        assert!(!dev.is_running());
        assert_eq!(regs.read(INT_MASK), u32::from(default_interrupt_mask()));
    }

    #[test]
    fn overlay_needs_a_framebuffer() {
        let (dev, _, _) = card();
        assert!(matches!(dev.enable_capture(true), Err(CaptureError::Format(_))));
        assert!(!dev.is_running());
    }

    #[test]
    fn enabling_overlay_links_and_starts_dma() {
        let (dev, regs, _) = card();
        dev.set_framebuffer(screen()).unwrap();
        dev.enable_capture(true).unwrap();
        assert!(dev.is_running());
        assert_eq!(regs.read(GPIO_DMA_CTL), 0b11);
        let table = dev.jump_table();
        assert_ne!(table.target(Slot::CaptureOdd), table.slot_address(Slot::SyncEven));
        assert_eq!(regs.read(E_HACTIVE_LO), DEFAULT_WIDTH & 0xff);

        dev.enable_capture(false).unwrap();
        assert!(!dev.is_running());
        assert_eq!(table.target(Slot::CaptureOdd), table.slot_address(Slot::SyncEven));
    }

    #[test]
    fn window_changes_are_written_to_both_banks() {
        let (dev, regs, _) = card();
        dev.set_framebuffer(screen()).unwrap();
        dev.enable_capture(true).unwrap();
        let window = CaptureWindow::new(640, 480, PixelFormat::Rgb32, Norm::PalBdghi);
        let geometry = dev.set_window(window).unwrap();
        assert!(geometry.interlaced);
        assert_eq!(regs.read(E_HACTIVE_LO), 640 & 0xff);
        assert_eq!(regs.read(E_HACTIVE_LO + ODD_BANK), 640 & 0xff);
        assert_eq!(regs.read(COLOR_FMT), 0x00);
    }

    #[test]
    fn failed_compiles_keep_the_old_program() {
        let (dev, _, mem) = card();
        dev.set_framebuffer(screen()).unwrap();
        dev.enable_capture(true).unwrap();
        let table = dev.jump_table();
        let linked = table.target(Slot::CaptureOdd);
        let before = dev.geometry();

        mem.set_exhausted(true);
        let window = CaptureWindow::new(640, 480, PixelFormat::Rgb565, Norm::PalBdghi);
        assert!(matches!(dev.set_window(window), Err(CaptureError::Allocation { .. })));
        assert!(matches!(
            dev.set_clips(&vec![ClipRect::new(0, 0, 1, 1); MAX_CLIPS + 1]),
            Err(CaptureError::ClipOverflow { .. }),
        ));
        assert_eq!(table.target(Slot::CaptureOdd), linked);
        assert_eq!(dev.geometry(), before);
    }

    #[test]
    fn norm_switch_is_refused_while_grabbing() {
        let (dev, regs, _) = card();
        dev.submit_grab(1, PixelFormat::Grey, 320, 240).unwrap();
        assert_eq!(dev.set_norm(Norm::Ntsc), Err(CaptureError::Busy(1)));
        assert_eq!(regs.read(ADELAY), 0x7f);
    }

    #[test]
    fn norm_switch_replans_the_window() {
        let (dev, regs, _) = card();
        dev.set_window(CaptureWindow::new(924, 576, PixelFormat::Rgb565, Norm::PalBdghi)).unwrap();
        dev.set_norm(Norm::Ntsc).unwrap();
        assert_eq!(regs.read(ADELAY), 0x68);
        assert_eq!(regs.read(BDELAY), 0x5d);
        assert_eq!(dev.window().norm, Norm::Ntsc);
        assert_eq!((dev.geometry().width, dev.geometry().height), (768, 480));
    }

    #[test]
    fn submitting_arms_the_frame_start() {
        let (dev, _, _) = card();
        dev.submit_grab(0, PixelFormat::Rgb565, 768, 576).unwrap();
        assert!(dev.jump_table().is_armed());
        assert!(dev.is_running());
        assert_eq!(dev.grab_state(0), SlotState::Queued);
        assert!(matches!(dev.submit_grab(2, PixelFormat::Rgb565, 768, 576), Err(CaptureError::Format(_))));
        assert!(matches!(dev.submit_grab(1, PixelFormat::Rgb565, 10, 576), Err(CaptureError::Format(_))));
        assert_eq!(dev.submit_grab(0, PixelFormat::Rgb565, 768, 576), Err(CaptureError::Busy(0)));
        assert_eq!(dev.wait_grab(1), Err(CaptureError::NotQueued(1)));
    }

    #[test]
    fn vbi_toggles_leave_capture_alone() {
        let (dev, regs, _) = card();
        dev.set_framebuffer(screen()).unwrap();
        dev.enable_capture(true).unwrap();
        let table = dev.jump_table();
        let capture = (table.target(Slot::CaptureOdd), table.target(Slot::CaptureEven));

        dev.enable_vbi(true).unwrap();
        assert_ne!(table.target(Slot::VbiOdd), table.slot_address(Slot::CaptureOdd));
        assert_eq!((table.target(Slot::CaptureOdd), table.target(Slot::CaptureEven)), capture);
        let control: CaptureControl = regs.read_as(CAP_CTL);
        assert!(control.vbi_odd() && control.vbi_even());

        dev.enable_vbi(false).unwrap();
        assert_eq!(table.target(Slot::VbiOdd), table.slot_address(Slot::CaptureOdd));
        assert_eq!((table.target(Slot::CaptureOdd), table.target(Slot::CaptureEven)), capture);
    }

    #[test]
    fn dropping_the_card_stops_dma() {
        let (dev, regs, _) = card();
        dev.enable_vbi(true).unwrap();
        assert_eq!(regs.read(GPIO_DMA_CTL), 0b11);
        drop(dev);
        assert_eq!(regs.read(GPIO_DMA_CTL), 0);
        assert_eq!(regs.read(INT_MASK), 0);
    }

}

// eof
