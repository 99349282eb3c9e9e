// SPDX-License-Identifier: GPL-3.0-or-later

//! Capture geometry: from a requested window to scaler register values
//!
//! The scaler works on the standard's sampling raster. A crop box picks part
//! of that raster, and the output window is the crop box scaled down. Nothing
//! is ever scaled up: the window is clamped to the crop box, and the crop box
//! to the raster.
//!
//! Documentation:
//!     - Bt848 data sheet, "Horizontal and Vertical Scaling", "Cropping"
//!

use log::debug;

use crate::dev::bt848::{
    Crop, E_CROP, E_HACTIVE_LO, E_HDELAY_LO, E_HSCALE_HI, E_HSCALE_LO, E_VACTIVE_LO,
    E_VDELAY_LO, E_VSCALE_HI, E_VSCALE_LO, E_VTC, ODD_BANK, VScaleHi, VerticalTiming,
};
use crate::dev::reg::RegisterIo;
use crate::error::{CaptureError, Result};
use crate::format::PixelFormat;
use crate::norm::{Norm, TuningStandard};

/// Narrowest window the scaler produces
pub const MIN_WIDTH: u32 = 48;

/// Shortest window the scaler produces
pub const MIN_HEIGHT: u32 = 32;

/// A rectangle of the standard's raster. A zero width or height means "to the
/// edge of the raster".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {

    /// The whole raster of `standard`
    pub fn full(standard: &TuningStandard) -> Self {
        CropRect {
            x: 0,
            y: 0,
            width: standard.crop_width as u32,
            height: standard.crop_height as u32,
        }
    }

    /// Fits the rectangle inside the raster of `standard`
    pub fn clamp_to(&self, standard: &TuningStandard) -> Self {
        let max_w = standard.crop_width as u32;
        let max_h = standard.crop_height as u32;
        let x = self.x.min(max_w - MIN_WIDTH);
        let y = self.y.min(max_h - MIN_HEIGHT);
        let width = match self.width {
            0 => max_w - x,
            w => w.clamp(MIN_WIDTH, max_w - x),
        };
        let height = match self.height {
            0 => max_h - y,
            h => h.clamp(MIN_HEIGHT, max_h - y),
        };
        CropRect { x, y, width, height }
    }

}

/// What the caller asks the digitizer to produce
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureWindow {

    pub width: u32,

    pub height: u32,

    /// Part of the raster to scale into the window
    pub crop: CropRect,

    pub format: PixelFormat,

    /// Capture both fields. When clear the window is limited to one field's
    /// height and only the odd field is captured.
    pub interlace: bool,

    pub norm: Norm,

    /// Position of the window on the framebuffer, for overlay
    pub x: i32,
    pub y: i32,

}

impl CaptureWindow {

    /// A window at the framebuffer origin taking the whole raster
    pub fn new(width: u32, height: u32, format: PixelFormat, norm: Norm) -> Self {
        CaptureWindow {
            width,
            height,
            crop: CropRect::default(),
            format,
            interlace: true,
            norm,
            x: 0,
            y: 0,
        }
    }

}

/// Scaler settings for one window, ready to be written to both banks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {

    /// Output width after clamping
    pub width: u32,

    /// Output height after clamping, both fields together
    pub height: u32,

    /// Crop box after clamping
    pub crop: CropRect,

    /// Both fields are captured
    pub interlaced: bool,

    pub hscale: u16,

    /// 13-bit vertical scale ratio
    pub vscale: u16,

    pub hdelay: u16,

    pub vdelay: u16,

    pub vactive: u16,

    pub crop_bits: Crop,

    pub vtc: VerticalTiming,

}

impl Geometry {

    /// Lines in each field's program
    #[inline]
    pub fn field_lines(&self) -> u32 {
        if self.interlaced { (self.height + 1) / 2 } else { self.height }
    }

    /// High byte of the vertical scale, keeping the comb filter setting
    pub fn vscale_hi(&self, comb: bool) -> VScaleHi {
        VScaleHi(0)
            .with_comb(comb)
            .with_interlaced(self.interlaced)
            .with_scale_hi((self.vscale >> 8) as u8)
    }

    /// Writes the geometry to the even and the odd register bank
    pub fn write<R>(&self, regs: &R)
        where
            R: RegisterIo + ?Sized,
    {
        for bank in [0, ODD_BANK] {
            regs.write_as(E_CROP + bank, self.crop_bits);
            regs.write(E_VDELAY_LO + bank, (self.vdelay & 0xff) as u32);
            regs.write(E_VACTIVE_LO + bank, (self.vactive & 0xff) as u32);
            regs.write(E_HDELAY_LO + bank, (self.hdelay & 0xff) as u32);
            regs.write(E_HACTIVE_LO + bank, self.width & 0xff);
            regs.write(E_HSCALE_HI + bank, (self.hscale >> 8) as u32);
            regs.write(E_HSCALE_LO + bank, (self.hscale & 0xff) as u32);
            let comb = regs.read_as::<VScaleHi>(E_VSCALE_HI + bank).comb();
            regs.write_as(E_VSCALE_HI + bank, self.vscale_hi(comb));
            regs.write(E_VSCALE_LO + bank, (self.vscale & 0xff) as u32);
            regs.write_as(E_VTC + bank, self.vtc);
        }
    }

}

/// Plans the scaler settings for `window` against `standard`.
///
/// Zero and below-minimum sizes are refused rather than silently grown, and so
/// is a width too narrow for the crop box to reach with the 16-bit scaler.
pub fn plan_geometry(window: &CaptureWindow, standard: &TuningStandard) -> Result<Geometry> {
    if window.width < MIN_WIDTH || window.height < MIN_HEIGHT {
        return Err(CaptureError::Format(format!(
            "{}x{} is below the {}x{} minimum",
            window.width, window.height, MIN_WIDTH, MIN_HEIGHT,
        )));
    }

    let crop = window.crop.clamp_to(standard);
    let width = window.width.min(crop.width);
    let height = match window.interlace {
        true => window.height.min(crop.height),
        false => window.height.min(crop.height / 2),
    };
    let interlaced = height > crop.height / 2;

    let xsf = width as u64 * standard.scaled_total_width as u64 / crop.width as u64;
    let hscale = (standard.total_width as u64 * 4096 / xsf.max(1)).saturating_sub(4096);
    let hscale = u16::try_from(hscale).map_err(|_| {
        CaptureError::Format(format!(
            "{} wide from a {} sample crop needs a scale of {:#x}, beyond the 16-bit scaler",
            width, crop.width, hscale,
        ))
    })?;

    let field_crop = if interlaced { crop.height } else { crop.height >> 1 };
    let sr = (field_crop * 512 / height).saturating_sub(512);
    let vscale = (0x10000u32.wrapping_sub(sr) & 0x1fff) as u16;

    let hdelay = (((standard.hdelay_x1 as u32 + crop.x) * width / crop.width) & 0x3fe) as u16;
    // An odd VDELAY makes the chip start on the wrong field.
    let vdelay = ((standard.vdelay as u32 + crop.y) & 0x3fe) as u16;
    let vactive = crop.height as u16;

    let crop_bits = Crop(0)
        .with_hactive_hi(((width >> 8) & 0x3) as u8)
        .with_hdelay_hi(((hdelay >> 8) & 0x3) as u8)
        .with_vactive_hi(((vactive >> 8) & 0x3) as u8)
        .with_vdelay_hi(((vdelay >> 8) & 0x3) as u8);

    let vfilt = match width {
        0..=192 => 2,
        193..=384 => 1,
        _ => 0,
    };

    let geometry = Geometry {
        width,
        height,
        crop,
        interlaced,
        hscale,
        vscale,
        hdelay,
        vdelay,
        vactive,
        crop_bits,
        vtc: VerticalTiming(0).with_vfilt(vfilt),
    };
    debug!(
        "{}: {}x{} from crop {:?}, hscale {:#06x} vscale {:#06x}{}",
        standard.name, width, height, crop, hscale, vscale,
        if interlaced { " interlaced" } else { "" },
    );
    Ok(geometry)
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::dev::reg::RegisterBank;

    fn window(width: u32, height: u32) -> CaptureWindow {
        CaptureWindow::new(width, height, PixelFormat::Rgb565, Norm::PalBdghi)
    }

    #[test]
    fn full_pal_frame_is_unscaled() {
        let geometry = plan_geometry(&window(924, 576), Norm::PalBdghi.standard()).unwrap();
        assert!(geometry.interlaced);
        assert_eq!(geometry.hscale, 0);
        assert_eq!(geometry.vscale, 0);
        assert_eq!(geometry.vactive, 576);
        assert_eq!(geometry.vdelay, 0x20);
        assert_eq!(geometry.hdelay, 186);
        assert!(geometry.vscale_hi(false).interlaced());
    }

    #[test]
    fn ntsc_cif() {
        let geometry = plan_geometry(&window(320, 240), Norm::Ntsc.standard()).unwrap();
        assert!(!geometry.interlaced);
        // xsf = 320*910/768 = 379, 910*4096/379 - 4096 = 5738
        assert_eq!(geometry.hscale, 5738);
        // 240 lines per field from 240: unscaled
        assert_eq!(geometry.vscale, 0);
        // 128*320/768 = 53, masked even
        assert_eq!(geometry.hdelay, 52);
        assert_eq!(geometry.vtc.vfilt(), 1);
        assert_eq!(geometry.field_lines(), 240);
    }

    #[test]
    fn halved_field_height() {
        let geometry = plan_geometry(&window(768, 144), Norm::PalN.standard()).unwrap();
        assert!(!geometry.interlaced);
        // 288*512/144 - 512 = 512
        assert_eq!(geometry.vscale, ((0x10000u32 - 512) & 0x1fff) as u16);
    }

    #[test]
    fn requests_are_clamped_to_the_crop_box() {
        let mut request = window(2000, 2000);
        request.crop = CropRect { x: 100, y: 50, width: 400, height: 300 };
        let geometry = plan_geometry(&request, Norm::PalBdghi.standard()).unwrap();
        assert_eq!((geometry.width, geometry.height), (400, 300));
        assert_eq!(geometry.vdelay, (0x20 + 50) & 0x3fe);

        request.crop = CropRect { x: 5000, y: 5000, width: 5000, height: 5000 };
        let geometry = plan_geometry(&request, Norm::PalBdghi.standard()).unwrap();
        assert_eq!(geometry.crop.x + geometry.crop.width, 924);
        assert_eq!(geometry.crop.y + geometry.crop.height, 576);
        assert!(geometry.width >= MIN_WIDTH);
    }

    #[test]
    fn tiny_windows_are_refused() {
        let standard = Norm::Ntsc.standard();
        assert!(matches!(plan_geometry(&window(0, 240), standard), Err(CaptureError::Format(_))));
        assert!(matches!(plan_geometry(&window(320, 0), standard), Err(CaptureError::Format(_))));
        assert!(matches!(plan_geometry(&window(47, 240), standard), Err(CaptureError::Format(_))));
        assert!(plan_geometry(&window(MIN_WIDTH, MIN_HEIGHT), standard).is_ok());
    }

    #[test]
    fn scale_beyond_sixteen_bits_is_refused() {
        let standard = Norm::PalBdghi.standard();
        // xsf = 54*1135/924 = 66, 1135*4096/66 - 4096 = 66342
        for width in MIN_WIDTH..=54 {
            assert!(matches!(plan_geometry(&window(width, 288), standard), Err(CaptureError::Format(_))), "{}", width);
        }
        // xsf = 67, 1135*4096/67 - 4096 = 65291
        assert_eq!(plan_geometry(&window(55, 288), standard).unwrap().hscale, 65291);

        // The same width is fine from a narrower crop.
        let mut request = window(54, 288);
        request.crop = CropRect { x: 0, y: 0, width: 462, height: 576 };
        assert!(plan_geometry(&request, standard).unwrap().hscale < 0x8000);
    }

    #[test]
    fn vdelay_stays_even() {
        let mut request = window(768, 576);
        request.crop = CropRect { x: 0, y: 7, width: 924, height: 500 };
        let geometry = plan_geometry(&request, Norm::PalBdghi.standard()).unwrap();
        assert_eq!(geometry.vdelay, 0x26);
        assert_eq!(geometry.vdelay % 2, 0);
    }

    #[test]
    fn single_field_requests_stay_in_one_field() {
        let mut request = window(640, 480);
        request.interlace = false;
        let geometry = plan_geometry(&request, Norm::PalBdghi.standard()).unwrap();
        assert!(!geometry.interlaced);
        assert_eq!(geometry.height, 288);
    }

    #[test]
    fn crop_byte_carries_the_high_bits() {
        let geometry = plan_geometry(&window(768, 576), Norm::PalBdghi.standard()).unwrap();
        let bits: u32 = geometry.crop_bits.into();
        let expected = ((768u32 >> 8) & 3)
            | ((geometry.hdelay as u32 >> 6) & 0xc)
            | ((576 >> 4) & 0x30)
            | ((geometry.vdelay as u32 >> 2) & 0xc0);
        assert_eq!(bits, expected);
    }

    #[test]
    fn both_banks_are_written_alike() {
        let regs = RegisterBank::new();
        regs.write(E_VSCALE_HI + ODD_BANK, 0x40);
        let geometry = plan_geometry(&window(320, 480), Norm::Ntsc.standard()).unwrap();
        geometry.write(&regs);
        for offset in [E_CROP, E_VDELAY_LO, E_HACTIVE_LO, E_HSCALE_HI, E_HSCALE_LO, E_VSCALE_LO, E_VTC] {
            assert_eq!(regs.read(offset), regs.read(offset + ODD_BANK), "{:#x}", offset);
        }
        assert_eq!(regs.read(E_HACTIVE_LO), 320 & 0xff);
        // The comb filter bit survives the rewrite.
        assert_eq!(regs.read(E_VSCALE_HI + ODD_BANK), regs.read(E_VSCALE_HI) | 0x40);
        assert_ne!(regs.read(E_VSCALE_HI) & 0x20, 0);
    }

}

// eof
