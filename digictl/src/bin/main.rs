// SPDX-License-Identifier: GPL-3.0-or-later

//! Drives a simulated digitizer: overlay, VBI and a pair of grabs, one frame
//! at a time. Run with `RUST_LOG=debug` to follow the controller.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail, ensure};
use bpaf::Bpaf;
use log::{info, warn};

use digitizer::dev::dma::{BufferId, HostDma, PageLayout};
use digitizer::dev::reg::RegisterBank;
use digitizer::grab::GRAB_BUFFERS;
use digitizer::sim::Sequencer;
use digitizer::{CaptureWindow, CardConfig, ClipRect, Digitizer, FrameBuffer, Norm, PixelFormat, SlotState};

/// Largest grab buffer the simulated bus has room for
const MAX_GRAB_BUFFER: usize = 0x0100_0000;

#[derive(Debug, Bpaf)]
#[bpaf(options, version, generate(cli_args))]
pub struct CmdLineArgs {

    #[bpaf(long)]
    pub configfile: Option<PathBuf>,

    /// Video standard, overriding the config file
    #[bpaf(long)]
    pub norm: Option<String>,

    #[bpaf(long, fallback(4))]
    pub frames: usize,

    #[bpaf(long, fallback(640))]
    pub width: u32,

    #[bpaf(long, fallback(480))]
    pub height: u32,

    #[bpaf(long, switch)]
    pub overlay: bool,

    #[bpaf(long, switch)]
    pub vbi: bool,

    /// Scatter grab buffer pages across the bus
    #[bpaf(long, switch)]
    pub scattered: bool,

}

fn parse_norm(name: &str) -> anyhow::Result<Norm> {
    match Norm::ALL.iter().find(|norm| norm.standard().name.eq_ignore_ascii_case(name)) {
        Some(norm) => Ok(*norm),
        None => bail!("unknown video standard {:?}", name),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args: CmdLineArgs = cli_args().run();

    let mut config = match &args.configfile {
        Some(path) => CardConfig::load(path).with_context(|| format!("reading {}", path.display()))?,
        None => CardConfig::default(),
    };
    if let Some(name) = &args.norm {
        config.norm = parse_norm(name)?;
    }
    ensure!(
        config.grab_buffer_size <= MAX_GRAB_BUFFER,
        "grab buffers are limited to {} bytes",
        MAX_GRAB_BUFFER,
    );

    let layout = if args.scattered { PageLayout::Scattered } else { PageLayout::Contiguous };
    let regs = Arc::new(RegisterBank::new());
    let mem = Arc::new(HostDma::with_layout(config.grab_buffer_size, config.page_size, layout));
    let norm = config.norm;
    let dev = Digitizer::new(regs.clone(), mem.clone(), config)?;

    if args.overlay {
        dev.set_framebuffer(FrameBuffer { base: 0x4000_0000, width: 1024, height: 768, bytes_per_line: 2048 })?;
        let window = CaptureWindow { x: 64, y: 48, ..CaptureWindow::new(320, 240, PixelFormat::Rgb565, norm) };
        dev.set_window(window)?;
        dev.set_clips(&[ClipRect::new(100, 40, 80, 60)])?;
        dev.enable_capture(true)?;
    }
    if args.vbi {
        dev.enable_vbi(true)?;
    }
    for buffer in 0..GRAB_BUFFERS {
        dev.submit_grab(buffer, PixelFormat::Rgb565, args.width, args.height)?;
    }

    let sequencer = Sequencer::new(&regs, &mem);
    for frame in 0..args.frames {
        if !dev.is_running() {
            break;
        }
        let trace = sequencer.run_frame(|| {
            let outcome = dev.handle_irq();
            if outcome.saturated {
                warn!("interrupt storm: {:?}", outcome);
            }
        })?;
        info!(
            "frame {}: {} lines, {} bytes skipped, interrupts {:?}{}",
            frame,
            trace.lines(),
            trace.skipped,
            trace.irqs,
            if trace.stopped { ", DMA stopped" } else { "" },
        );
        for buffer in 0..GRAB_BUFFERS {
            let bytes = trace.bytes_into(BufferId::Grab(buffer));
            if bytes > 0 {
                info!("frame {}: {} bytes into grab buffer {}", frame, bytes, buffer);
            }
        }
    }

    for buffer in 0..GRAB_BUFFERS {
        match dev.grab_state(buffer) {
            SlotState::Complete => {
                dev.wait_grab(buffer)?;
                println!("grab buffer {}: done", buffer);
            }
            state => println!("grab buffer {}: {:?} after {} frames", buffer, state, args.frames),
        }
    }
    println!("{} sequencer restarts, {} program regions live", dev.resyncs(), mem.live_regions());
    Ok(())
}

// eof
