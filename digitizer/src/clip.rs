// SPDX-License-Identifier: GPL-3.0-or-later

//! Overlay programs: writing the live picture around on-screen clip rectangles
//!
//! Each scanline of the window becomes a run of WRITE and SKIP instructions.
//! Pixels under a clip rectangle (or past the framebuffer edge) are skipped,
//! everything else is written straight into the framebuffer.

use log::{debug, trace};

use crate::dev::dma::DmaMemory;
use crate::dev::risc::RiscStatus;
use crate::dev::risc::commands::MAX_BYTE_COUNT;
use crate::dev::risc::program::{Field, Linkage, ProgramBuilder, ProgramPair};
use crate::error::{CaptureError, Result};
use crate::geometry::{CaptureWindow, Geometry};

/// Most clip rectangles one compilation accepts
pub const MAX_CLIPS: usize = 256;

/// A region of the window that must not be overwritten, in window pixels.
/// May extend past the window on any side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClipRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ClipRect {

    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        ClipRect { x, y, width, height }
    }

}

/// The visible framebuffer the overlay is drawn into
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameBuffer {

    /// Bus address of pixel (0, 0)
    pub base: u32,

    pub width: u32,

    pub height: u32,

    pub bytes_per_line: u32,

}

/// Half-open box in window coordinates
#[derive(Clone, Copy, Debug)]
struct Span {
    left: i64,
    right: i64,
    top: i64,
    bottom: i64,
}

impl Span {

    fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Span { left: x, right: x + width, top: y, bottom: y + height }
    }

    fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

}

/// What a stretch of one scanline does
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Run {
    Write { from: u32, to: u32 },
    Skip { from: u32, to: u32 },
}

/// The parts of the window past the edges of the framebuffer
fn edge_spans(window: &CaptureWindow, width: u32, height: u32, fb: &FrameBuffer) -> Vec<Span> {
    let (x, y) = (window.x as i64, window.y as i64);
    let (w, h) = (width as i64, height as i64);
    let (fb_w, fb_h) = (fb.width as i64, fb.height as i64);
    [
        Span::new(0, 0, -x, h),
        Span::new(fb_w - x, 0, x + w - fb_w, h),
        Span::new(0, 0, w, -y),
        Span::new(0, fb_h - y, w, y + h - fb_h),
    ]
    .into_iter()
    .filter(|span| !span.is_empty())
    .collect()
}

fn flush(covered: (i64, i64), cursor: &mut i64, runs: &mut Vec<Run>) {
    if covered.0 > *cursor {
        runs.push(Run::Write { from: *cursor as u32, to: covered.0 as u32 });
    }
    runs.push(Run::Skip { from: covered.0 as u32, to: covered.1 as u32 });
    *cursor = covered.1;
}

/// Cuts one line of `width` pixels into write and skip runs. `active` is
/// ordered by left edge.
fn line_runs(active: &[Span], width: u32, runs: &mut Vec<Run>) {
    runs.clear();
    let width = width as i64;
    let mut cursor = 0i64;
    let mut covered: Option<(i64, i64)> = None;

    for span in active {
        let left = span.left.clamp(0, width);
        let right = span.right.clamp(0, width);
        if left >= right {
            continue;
        }
        covered = match covered {
            Some((from, to)) if left <= to => Some((from, to.max(right))),
            Some(done) => {
                flush(done, &mut cursor, runs);
                Some((left, right))
            }
            None => Some((left, right)),
        };
    }
    if let Some(done) = covered {
        flush(done, &mut cursor, runs);
    }
    if cursor < width {
        runs.push(Run::Write { from: cursor as u32, to: width as u32 });
    }
}

/// Compiles the overlay program pair for `window`, scaled as `geometry`
/// describes, drawn into `fb` around `clips`.
///
/// Each field's program ends with a jump to its return address in `link`;
/// the jump of the field that completes the frame raises an overlay
/// interrupt. Nothing is allocated unless both fields compile.
pub fn compile_clip_program<M>(
    mem: &M,
    window: &CaptureWindow,
    geometry: &Geometry,
    fb: &FrameBuffer,
    clips: &[ClipRect],
    link: Linkage,
    limit: usize,
) -> Result<ProgramPair>
    where
        M: DmaMemory + ?Sized,
{
    if clips.len() > MAX_CLIPS {
        return Err(CaptureError::ClipOverflow { count: clips.len() });
    }
    if window.format.is_raw() {
        return Err(CaptureError::Format("raw samples cannot be overlaid".into()));
    }
    let bpp = window.format.bytes_per_pixel();
    let (width, height) = (geometry.width, geometry.height);
    if width * bpp > MAX_BYTE_COUNT as u32 {
        return Err(CaptureError::Format(format!(
            "{} pixel lines do not fit one instruction at {} bytes per pixel",
            width, bpp,
        )));
    }

    let mut spans: Vec<Span> = clips
        .iter()
        .map(|clip| Span::new(clip.x as i64, clip.y as i64, clip.width as i64, clip.height as i64))
        .filter(|span| !span.is_empty())
        .collect();
    spans.extend(edge_spans(window, width, height, fb));
    spans.sort_by_key(|span| span.top);

    let interlaced = geometry.interlaced;
    let origin = fb.base as i64
        + window.y as i64 * fb.bytes_per_line as i64
        + window.x as i64 * bpp as i64;

    let build = |field: Field| {
        let mut builder = ProgramBuilder::new(limit);
        let mut next = 0;
        let mut active: Vec<Span> = Vec::new();
        let mut runs = Vec::new();

        for y in field.lines(height, interlaced) {
            let y64 = y as i64;
            while next < spans.len() && spans[next].top <= y64 {
                let span = spans[next];
                let at = active.partition_point(|other| other.left <= span.left);
                active.insert(at, span);
                next += 1;
            }
            active.retain(|span| span.bottom > y64);

            line_runs(&active, width, &mut runs);
            let line = origin + y64 * fb.bytes_per_line as i64;
            let last = runs.len() - 1;
            for (i, run) in runs.iter().enumerate() {
                let (sol, eol) = (i == 0, i == last);
                match *run {
                    Run::Write { from, to } => {
                        let addr = (line + from as i64 * bpp as i64) as u32;
                        builder.write(sol, eol, ((to - from) * bpp) as u16, addr);
                    }
                    Run::Skip { from, to } => {
                        builder.skip(sol, eol, ((to - from) * bpp) as u16);
                    }
                }
            }
            trace!("{:?} line {}: {} runs", field, y, runs.len());
        }

        let tag = (field == Field::completing(interlaced)).then_some(RiscStatus::OVERLAY);
        builder.jump(link.return_for(field), tag);
        builder
    };

    let odd = build(Field::Odd);
    let even = build(Field::Even);
    for builder in [&odd, &even] {
        if builder.len() > limit {
            return Err(CaptureError::ProgramTooLarge { words: builder.len(), limit });
        }
    }
    debug!(
        "overlay {}x{} at ({}, {}) with {} clips: {} + {} words",
        width, height, window.x, window.y, clips.len(), odd.len(), even.len(),
    );
    Ok(ProgramPair { odd: odd.finish(mem)?, even: even.finish(mem)? })
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::dev::dma::HostDma;
    use crate::dev::risc::program::Instruction;
    use crate::format::PixelFormat;
    use crate::geometry::plan_geometry;
    use crate::norm::Norm;

    const LINK: Linkage = Linkage { odd_return: 0x100, even_return: 0x200 };

    fn screen() -> FrameBuffer {
        FrameBuffer { base: 0x4000_0000, width: 1024, height: 768, bytes_per_line: 2048 }
    }

    fn setup(width: u32, height: u32) -> (CaptureWindow, Geometry) {
        let window = CaptureWindow::new(width, height, PixelFormat::Rgb565, Norm::Ntsc);
        let geometry = plan_geometry(&window, window.norm.standard()).unwrap();
        (window, geometry)
    }

    /// The runs of each line, as (is_write, bytes) with SOL/EOL checked
    fn lines(instructions: &[Instruction]) -> Vec<Vec<(bool, u16)>> {
        let mut out = Vec::new();
        let mut line = Vec::new();
        for instruction in instructions {
            let (write, sol, eol, len) = match *instruction {
                Instruction::Write { sol, eol, len, .. } => (true, sol, eol, len),
                Instruction::Skip { sol, eol, len } => (false, sol, eol, len),
                _ => continue,
            };
            assert_eq!(sol, line.is_empty());
            line.push((write, len));
            if eol {
                out.push(std::mem::take(&mut line));
            }
        }
        assert!(line.is_empty());
        out
    }

    #[test]
    fn fully_clipped_window_skips_every_line() {
        let mem = HostDma::new(0x1000);
        let (window, geometry) = setup(320, 240);
        let clips = [ClipRect::new(0, 0, 320, 240)];
        let pair = compile_clip_program(&mem, &window, &geometry, &screen(), &clips, LINK, 65536).unwrap();

        let odd = pair.odd.instructions();
        assert_eq!(odd.len(), 240 + 1);
        assert!(odd[..240].iter().all(|i| *i == Instruction::Skip { sol: true, eol: true, len: 640 }));
        assert_eq!(odd[240], Instruction::Jump { target: 0x100, irq: true, status: RiscStatus::OVERLAY });
        assert_eq!(pair.even.instructions(), vec![
            Instruction::Jump { target: 0x200, irq: false, status: RiscStatus::empty() },
        ]);
    }

    #[test]
    fn disjoint_clips_come_out_in_x_order() {
        let mem = HostDma::new(0x1000);
        let (window, geometry) = setup(320, 240);
        let right = ClipRect::new(200, 10, 40, 20);
        let left = ClipRect::new(50, 10, 30, 20);
        for clips in [[left, right], [right, left]] {
            let pair = compile_clip_program(&mem, &window, &geometry, &screen(), &clips, LINK, 65536).unwrap();
            let lines = lines(&pair.odd.instructions());
            assert_eq!(lines.len(), 240);
            assert_eq!(lines[9], vec![(true, 640)]);
            assert_eq!(lines[10], vec![(true, 100), (false, 60), (true, 240), (false, 80), (true, 160)]);
            assert_eq!(lines[29].len(), 5);
            assert_eq!(lines[30], vec![(true, 640)]);
        }
    }

    #[test]
    fn overlapping_clips_are_unioned() {
        let mem = HostDma::new(0x1000);
        let (window, geometry) = setup(320, 240);
        let clips = [ClipRect::new(10, 0, 50, 1), ClipRect::new(40, 0, 50, 1), ClipRect::new(90, 0, 10, 1)];
        let pair = compile_clip_program(&mem, &window, &geometry, &screen(), &clips, LINK, 65536).unwrap();
        let lines = lines(&pair.odd.instructions());
        assert_eq!(lines[0], vec![(true, 20), (false, 180), (true, 440)]);
    }

    #[test]
    fn writes_land_at_the_window_position() {
        let mem = HostDma::new(0x1000);
        let (mut window, geometry) = setup(320, 240);
        window.x = 16;
        window.y = 4;
        let clips = [ClipRect::new(0, 0, 8, 240)];
        let pair = compile_clip_program(&mem, &window, &geometry, &screen(), &clips, LINK, 65536).unwrap();
        let first_write = pair.odd.instructions().into_iter().find_map(|i| match i {
            Instruction::Write { addr, .. } => Some(addr),
            _ => None,
        });
        assert_eq!(first_write, Some(0x4000_0000 + 4 * 2048 + (16 + 8) * 2));
    }

    #[test]
    fn framebuffer_edges_clip_the_window() {
        let mem = HostDma::new(0x1000);
        let (mut window, geometry) = setup(320, 240);
        window.x = -20;
        window.y = 700;
        let pair = compile_clip_program(&mem, &window, &geometry, &screen(), &[], LINK, 65536).unwrap();
        let lines = lines(&pair.odd.instructions());
        // 68 lines are on screen, the left 20 pixels are off it
        assert_eq!(lines[0], vec![(false, 40), (true, 600)]);
        assert_eq!(lines[67], vec![(false, 40), (true, 600)]);
        assert_eq!(lines[68], vec![(false, 640)]);
    }

    #[test]
    fn interlaced_fields_split_the_lines() {
        let mem = HostDma::new(0x1000);
        let (window, geometry) = setup(320, 480);
        assert!(geometry.interlaced);
        let clips = [ClipRect::new(0, 1, 320, 1)];
        let pair = compile_clip_program(&mem, &window, &geometry, &screen(), &clips, LINK, 65536).unwrap();
        let odd = lines(&pair.odd.instructions());
        let even = lines(&pair.even.instructions());
        assert_eq!((odd.len(), even.len()), (240, 240));
        assert_eq!(even[0], vec![(false, 640)]);
        assert_eq!(odd[0], vec![(true, 640)]);
        assert_eq!(even[1], vec![(true, 640)]);
        let even_jump = pair.even.instructions().pop();
        assert_eq!(even_jump, Some(Instruction::Jump { target: 0x200, irq: true, status: RiscStatus::OVERLAY }));
    }

    #[test]
    fn too_many_clips() {
        let mem = HostDma::new(0x1000);
        let (window, geometry) = setup(320, 240);
        let clips = vec![ClipRect::new(0, 0, 1, 1); MAX_CLIPS + 1];
        let result = compile_clip_program(&mem, &window, &geometry, &screen(), &clips, LINK, 65536);
        assert_eq!(result.err(), Some(CaptureError::ClipOverflow { count: MAX_CLIPS + 1 }));
        assert_eq!(mem.live_regions(), 0);
    }

    #[test]
    fn word_limit_is_checked_before_allocating() {
        let mem = HostDma::new(0x1000);
        let (window, geometry) = setup(320, 240);
        let result = compile_clip_program(&mem, &window, &geometry, &screen(), &[], LINK, 100);
        assert!(matches!(result, Err(CaptureError::ProgramTooLarge { limit: 100, .. })));
        assert_eq!(mem.live_regions(), 0);
    }

}

// eof
