// SPDX-License-Identifier: GPL-3.0-or-later

//! Memory grab and VBI programs
//!
//! Unlike overlay, a grab writes whole scanlines into a buffer owned by the
//! DMA allocator. The buffer is only contiguous page by page, so a scanline
//! is cut wherever the next page does not follow on the bus.

use log::debug;

use crate::dev::dma::{BufferId, DmaMemory};
use crate::dev::risc::RiscStatus;
use crate::dev::risc::commands::MAX_BYTE_COUNT;
use crate::dev::risc::program::{Field, Linkage, ProgramBuilder, ProgramPair};
use crate::error::{CaptureError, Result};
use crate::format::{PixelFormat, RAW_FIELD_LINES, RAW_LINE_BYTES};
use crate::geometry::Geometry;

/// VBI lines captured per field
pub const VBI_LINES: usize = 16;

/// Distance between VBI lines in the VBI buffer
pub const VBI_LINE_PITCH: usize = 2048;

/// Bytes of samples stored per VBI line
pub const VBI_LINE_BYTES: usize = 2044;

/// Emits the WRITEs for `len` bytes at `offset` in `buffer`, one per run of
/// bus-contiguous pages.
fn write_line<M>(
    builder: &mut ProgramBuilder,
    mem: &M,
    buffer: BufferId,
    offset: usize,
    len: usize,
) -> Result<()>
    where
        M: DmaMemory + ?Sized,
{
    let page = mem.page_size();
    let end = offset + len;
    let mut at = offset;
    while at < end {
        let bus = mem.bus_address(buffer, at).ok_or_else(|| {
            CaptureError::Format(format!("{:?} has no byte at offset {:#x}", buffer, at))
        })?;
        let mut stop = ((at / page + 1) * page).min(end);
        while stop < end && mem.bus_address(buffer, stop) == Some(bus + (stop - at) as u32) {
            stop = ((stop / page + 1) * page).min(end);
        }
        builder.write(at == offset, stop == end, (stop - at) as u16, bus);
        at = stop;
    }
    Ok(())
}

/// Refuses a layout that does not fit the buffer
fn check_fits<M>(mem: &M, buffer: BufferId, needed: usize) -> Result<()>
    where
        M: DmaMemory + ?Sized,
{
    let available = mem.buffer_len(buffer);
    if needed > available {
        return Err(CaptureError::Format(format!(
            "{:?} holds {} bytes, capture needs {}",
            buffer, available, needed,
        )));
    }
    Ok(())
}

fn publish<M>(mem: &M, odd: ProgramBuilder, even: ProgramBuilder, limit: usize) -> Result<ProgramPair>
    where
        M: DmaMemory + ?Sized,
{
    for builder in [&odd, &even] {
        if builder.len() > limit {
            return Err(CaptureError::ProgramTooLarge { words: builder.len(), limit });
        }
    }
    Ok(ProgramPair { odd: odd.finish(mem)?, even: even.finish(mem)? })
}

/// Compiles the grab program pair writing a `format` picture of `geometry`
/// into `buffer`.
///
/// Lines are stored top to bottom with no padding; the fields of an
/// interlaced capture are woven together. Raw captures keep the fields apart,
/// the even field starting halfway into the buffer. The jump of the field
/// completing the frame raises a grab interrupt.
pub fn compile_raw_program<M>(
    mem: &M,
    format: PixelFormat,
    geometry: &Geometry,
    buffer: BufferId,
    link: Linkage,
    limit: usize,
) -> Result<ProgramPair>
    where
        M: DmaMemory + ?Sized,
{
    let mut odd = ProgramBuilder::new(limit);
    let mut even = ProgramBuilder::new(limit);

    let completing = if format.is_raw() {
        let half = mem.buffer_len(buffer) / 2;
        let field_bytes = (RAW_FIELD_LINES * RAW_LINE_BYTES) as usize;
        check_fits(mem, buffer, half + field_bytes)?;
        for (builder, base) in [(&mut odd, 0), (&mut even, half)] {
            for line in 0..RAW_FIELD_LINES as usize {
                write_line(builder, mem, buffer, base + line * RAW_LINE_BYTES as usize, RAW_LINE_BYTES as usize)?;
            }
        }
        Field::Even
    } else {
        let stride = format.line_bytes(geometry.width) as usize;
        if stride > MAX_BYTE_COUNT as usize {
            return Err(CaptureError::Format(format!("{} byte lines are too long", stride)));
        }
        check_fits(mem, buffer, stride * geometry.height as usize)?;
        for (builder, field) in [(&mut odd, Field::Odd), (&mut even, Field::Even)] {
            for y in field.lines(geometry.height, geometry.interlaced) {
                write_line(builder, mem, buffer, y as usize * stride, stride)?;
            }
        }
        Field::completing(geometry.interlaced)
    };

    for (builder, field) in [(&mut odd, Field::Odd), (&mut even, Field::Even)] {
        let tag = (field == completing).then_some(RiscStatus::GRAB);
        builder.jump(link.return_for(field), tag);
    }
    debug!(
        "grab {:?} {}x{} {:?} into {:?}: {} + {} words",
        format, geometry.width, geometry.height, completing, buffer, odd.len(), even.len(),
    );
    publish(mem, odd, even, limit)
}

/// Compiles the VBI program pair: [`VBI_LINES`] lines per field into the VBI
/// buffer, odd field first. The even field's jump raises a VBI interrupt.
pub fn compile_vbi_program<M>(mem: &M, link: Linkage, limit: usize) -> Result<ProgramPair>
    where
        M: DmaMemory + ?Sized,
{
    check_fits(mem, BufferId::Vbi, 2 * VBI_LINES * VBI_LINE_PITCH)?;
    let mut odd = ProgramBuilder::new(limit);
    let mut even = ProgramBuilder::new(limit);
    for (builder, first) in [(&mut odd, 0), (&mut even, VBI_LINES)] {
        for line in first..first + VBI_LINES {
            write_line(builder, mem, BufferId::Vbi, line * VBI_LINE_PITCH, VBI_LINE_BYTES)?;
        }
    }
    odd.jump(link.odd_return, None);
    even.jump(link.even_return, Some(RiscStatus::VBI));
    publish(mem, odd, even, limit)
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::dev::dma::{HostDma, PageLayout, VBI_BUFFER_LEN};
    use crate::dev::risc::program::Instruction;
    use crate::geometry::{CaptureWindow, plan_geometry};
    use crate::norm::Norm;

    const LINK: Linkage = Linkage { odd_return: 0x100, even_return: 0x200 };

    fn geometry(width: u32, height: u32, norm: Norm) -> Geometry {
        let window = CaptureWindow::new(width, height, PixelFormat::Rgb565, norm);
        plan_geometry(&window, norm.standard()).unwrap()
    }

    fn writes(instructions: &[Instruction]) -> Vec<(bool, bool, u16, u32)> {
        instructions
            .iter()
            .filter_map(|i| match *i {
                Instruction::Write { sol, eol, len, addr } => Some((sol, eol, len, addr)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn full_pal_frame() {
        let mem = HostDma::new(768 * 576 * 2);
        let geometry = geometry(768, 576, Norm::PalBdghi);
        let pair = compile_raw_program(&mem, PixelFormat::Rgb565, &geometry, BufferId::Grab(0), LINK, 65536).unwrap();
        let base = mem.bus_address(BufferId::Grab(0), 0).unwrap();

        for (field, first) in [(Field::Odd, 0), (Field::Even, 1)] {
            let instructions = pair.field(field).instructions();
            assert_eq!(instructions.len(), 288 + 1);
            let writes = writes(&instructions);
            assert_eq!(writes.len(), 288);
            for (i, (sol, eol, len, addr)) in writes.into_iter().enumerate() {
                assert!(sol && eol);
                assert_eq!(len, 1536);
                assert_eq!(addr, base + ((first + 2 * i) * 1536) as u32);
            }
        }
        assert_eq!(pair.odd.instructions().last(), Some(&Instruction::Jump {
            target: 0x100, irq: false, status: RiscStatus::empty(),
        }));
        assert_eq!(pair.even.instructions().last(), Some(&Instruction::Jump {
            target: 0x200, irq: true, status: RiscStatus::GRAB,
        }));
    }

    #[test]
    fn single_field_grab_completes_on_the_odd_field() {
        let mem = HostDma::new(320 * 240 * 2);
        let geometry = geometry(320, 240, Norm::Ntsc);
        let pair = compile_raw_program(&mem, PixelFormat::Rgb565, &geometry, BufferId::Grab(1), LINK, 65536).unwrap();
        let odd = pair.odd.instructions();
        assert_eq!(writes(&odd).len(), 240);
        assert_eq!(odd.last(), Some(&Instruction::Jump { target: 0x100, irq: true, status: RiscStatus::GRAB }));
        assert_eq!(pair.even.instructions().len(), 1);
    }

    #[test]
    fn lines_are_cut_at_discontiguous_pages() {
        let mem = HostDma::with_layout(0xe0000, 4096, PageLayout::Scattered);
        let geometry = geometry(768, 576, Norm::PalBdghi);
        let pair = compile_raw_program(&mem, PixelFormat::Rgb565, &geometry, BufferId::Grab(0), LINK, 65536).unwrap();
        let bus = |offset| mem.bus_address(BufferId::Grab(0), offset).unwrap();
        let writes = writes(&pair.odd.instructions());
        assert_eq!(writes[0], (true, true, 1536, bus(0)));
        // Line 2 starts at 3072 and runs 512 bytes into the second page.
        assert_eq!(&writes[1..3], &[
            (true, false, 1024, bus(3072)),
            (false, true, 512, bus(4096)),
        ]);
    }

    #[test]
    fn contiguous_pages_are_not_cut() {
        let mem = HostDma::with_layout(0x100000, 4096, PageLayout::Contiguous);
        let geometry = geometry(768, 576, Norm::PalBdghi);
        let pair = compile_raw_program(&mem, PixelFormat::Rgb565, &geometry, BufferId::Grab(0), LINK, 65536).unwrap();
        assert!(writes(&pair.odd.instructions()).iter().all(|w| w.0 && w.1));
    }

    #[test]
    fn raw_fields_are_kept_apart() {
        let len = 2 * (RAW_FIELD_LINES * RAW_LINE_BYTES) as usize;
        let mem = HostDma::new(len);
        let geometry = geometry(768, 576, Norm::PalBdghi);
        let pair = compile_raw_program(&mem, PixelFormat::Raw, &geometry, BufferId::Grab(0), LINK, 65536).unwrap();
        let base = mem.bus_address(BufferId::Grab(0), 0).unwrap();
        let odd = writes(&pair.odd.instructions());
        let even = writes(&pair.even.instructions());
        assert_eq!((odd.len(), even.len()), (640, 640));
        assert_eq!(odd[1].3, base + 1024);
        assert_eq!(even[0].3, base + (len / 2) as u32);
        assert!(odd.iter().chain(even.iter()).all(|w| w.2 == 1024));
    }

    #[test]
    fn short_buffers_are_refused() {
        let mem = HostDma::new(4096);
        let geometry = geometry(768, 576, Norm::PalBdghi);
        let result = compile_raw_program(&mem, PixelFormat::Rgb565, &geometry, BufferId::Grab(0), LINK, 65536);
        assert!(matches!(result, Err(CaptureError::Format(_))));
        assert_eq!(mem.live_regions(), 0);
    }

    #[test]
    fn vbi_program() {
        let mem = HostDma::new(4096);
        let pair = compile_vbi_program(&mem, LINK, 65536).unwrap();
        let base = mem.bus_address(BufferId::Vbi, 0).unwrap();
        let odd = writes(&pair.odd.instructions());
        let even = writes(&pair.even.instructions());
        assert_eq!((odd.len(), even.len()), (VBI_LINES, VBI_LINES));
        assert_eq!(odd[0], (true, true, 2044, base));
        assert_eq!(even[0].3, base + (VBI_LINES * VBI_LINE_PITCH) as u32);
        assert!(even.last().unwrap().3 < base + VBI_BUFFER_LEN as u32);
        assert_eq!(pair.even.instructions().last(), Some(&Instruction::Jump {
            target: 0x200, irq: true, status: RiscStatus::VBI,
        }));
    }

}

// eof
