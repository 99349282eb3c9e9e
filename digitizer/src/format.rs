// SPDX-License-Identifier: GPL-3.0-or-later

//! Pixel formats the FIFO can pack

use serde::Deserialize;

use crate::dev::bt848::{ColorControl, ColorFormat};

/// Format codes for one nibble of [`COLOR_FMT`](crate::dev::bt848::COLOR_FMT)
pub mod code {
    pub const RGB32: u8 = 0x0;
    pub const RGB24: u8 = 0x1;
    pub const RGB16: u8 = 0x2;
    pub const RGB15: u8 = 0x3;
    pub const YUY2: u8 = 0x4;
    pub const Y8: u8 = 0x6;
    pub const RGB8: u8 = 0x7;
    pub const RAW: u8 = 0xe;
}

/// Bytes per line of a raw (undecoded) capture
pub const RAW_LINE_BYTES: u32 = 1024;

/// Lines per field of a raw capture
pub const RAW_FIELD_LINES: u32 = 640;

/// Output pixel format
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PixelFormat {

    /// 8-bit luma only
    Grey,

    /// 8-bit dithered RGB, 240-entry palette
    Hi240,

    /// 5:5:5 RGB
    Rgb555,

    /// 5:6:5 RGB
    Rgb565,

    /// Packed 8:8:8 RGB
    Rgb24,

    /// 8:8:8 RGB with a pad byte
    Rgb32,

    /// Packed 4:2:2, Y0 U Y1 V
    Yuyv,

    /// Packed 4:2:2, U Y0 V Y1
    Uyvy,

    /// Undecoded composite samples, fixed line layout
    Raw,

}

impl PixelFormat {

    /// Bytes per pixel; raw captures are sized per line instead
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Grey | PixelFormat::Hi240 => 1,
            PixelFormat::Rgb555 | PixelFormat::Rgb565 => 2,
            PixelFormat::Yuyv | PixelFormat::Uyvy | PixelFormat::Raw => 2,
            PixelFormat::Rgb24 => 3,
            PixelFormat::Rgb32 => 4,
        }
    }

    #[inline]
    pub fn is_raw(self) -> bool {
        self == PixelFormat::Raw
    }

    /// Bytes one scanline of `width` pixels takes in memory
    pub fn line_bytes(self, width: u32) -> u32 {
        if self.is_raw() {
            RAW_LINE_BYTES
        } else {
            width * self.bytes_per_pixel()
        }
    }

    fn code(self) -> u8 {
        match self {
            PixelFormat::Grey => code::Y8,
            PixelFormat::Hi240 => code::RGB8,
            PixelFormat::Rgb555 => code::RGB15,
            PixelFormat::Rgb565 => code::RGB16,
            PixelFormat::Rgb24 => code::RGB24,
            PixelFormat::Rgb32 => code::RGB32,
            PixelFormat::Yuyv | PixelFormat::Uyvy => code::YUY2,
            PixelFormat::Raw => code::RAW,
        }
    }

    /// Value for the color format register; both fields use the same format
    pub fn color_format(self) -> ColorFormat {
        ColorFormat(0)
            .with_odd(self.code())
            .with_even(self.code())
    }

    /// Value for the color control register
    pub fn color_control(self, gamma: bool) -> ColorControl {
        let swap = self == PixelFormat::Uyvy;
        ColorControl(0)
            .with_gamma(gamma)
            .with_bswap_odd(swap)
            .with_bswap_even(swap)
    }

}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn color_format_repeats_the_code_per_field() {
        let value: u32 = PixelFormat::Rgb565.color_format().into();
        assert_eq!(value, 0x22);
        let value: u32 = PixelFormat::Raw.color_format().into();
        assert_eq!(value, 0xee);
    }

    #[test]
    fn raw_lines_have_a_fixed_size() {
        assert_eq!(PixelFormat::Raw.line_bytes(768), RAW_LINE_BYTES);
        assert_eq!(PixelFormat::Rgb24.line_bytes(768), 768 * 3);
    }

    #[test]
    fn only_uyvy_swaps_bytes() {
        let uyvy: u32 = PixelFormat::Uyvy.color_control(false).into();
        let yuyv: u32 = PixelFormat::Yuyv.color_control(false).into();
        assert_eq!(uyvy, 0b0011);
        assert_eq!(yuyv, 0);
    }

}

// eof
