// SPDX-License-Identifier: GPL-3.0-or-later

//! Video standards and their base capture geometry.
//!
//! Each standard fixes the sampling raster the scaler works from: how many
//! samples make up a whole line at the chip's clock, how many of those are
//! active picture, where the active picture starts and how many lines a frame
//! has. The calibration values are the ones that center the picture on real
//! hardware and are not derived from anything.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Deserialize;

use crate::error::{CaptureError, Result};

/// Input-format codes for [`IFORM`](crate::dev::bt848::IFORM) bits 2:0
pub mod iform {
    pub const NTSC: u8 = 1;
    pub const NTSC_J: u8 = 2;
    pub const PAL_BDGHI: u8 = 3;
    pub const PAL_M: u8 = 4;
    pub const PAL_N: u8 = 5;
    pub const SECAM: u8 = 6;
    pub const PAL_NC: u8 = 7;

    /// Crystal 0, 28.636363 MHz (4 × NTSC subcarrier)
    pub const XT0: u8 = 1 << 3;

    /// Crystal 1, 35.468950 MHz (8 × PAL subcarrier / 2)
    pub const XT1: u8 = 2 << 3;
}

/// The supported video standards, by table index
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum Norm {
    PalBdghi = 0,
    Ntsc = 1,
    Secam = 2,
    PalM = 3,
    PalN = 4,
    PalNc = 5,
    NtscJapan = 6,
}

impl Default for Norm {
    fn default() -> Self {
        Norm::PalBdghi
    }
}

impl Norm {

    pub const ALL: [Norm; 7] = [
        Norm::PalBdghi,
        Norm::Ntsc,
        Norm::Secam,
        Norm::PalM,
        Norm::PalN,
        Norm::PalNc,
        Norm::NtscJapan,
    ];

    /// Looks a standard up by its table index
    pub fn from_index(index: u8) -> Result<Self> {
        Norm::try_from_primitive(index)
            .map_err(|_| CaptureError::Format(format!("no video standard with index {}", index)))
    }

    #[inline]
    pub fn standard(self) -> &'static TuningStandard {
        &STANDARDS[u8::from(self) as usize]
    }

}

/// Base geometry of a video standard
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TuningStandard {

    pub name: &'static str,

    /// Frequency in Hz of the crystal [`iform`](Self::iform) selects
    pub fsc: u32,

    /// Widest crop box, in samples at [`scaled_total_width`](Self::scaled_total_width) rate
    pub crop_width: u16,

    /// Tallest crop box, in frame lines
    pub crop_height: u16,

    /// Samples per whole line at half the crystal rate, blanking included
    pub total_width: u16,

    /// AGC gate delay
    pub adelay: u8,

    /// Color burst gate delay
    pub bdelay: u8,

    /// Value for the input-format register: standard code and crystal
    pub iform: u8,

    /// Samples per whole line at square-pixel rate
    pub scaled_total_width: u16,

    /// Start of active picture for an unscaled line
    pub hdelay_x1: u16,

    /// Lines from vertical sync to the first captured line
    pub vdelay: u16,

    /// VBI samples per line, in dwords
    pub vbi_pack: u8,

}

/// The standards, indexed by [`Norm`]
pub static STANDARDS: [TuningStandard; 7] = [
    TuningStandard {
        name: "PAL-BDGHI",
        fsc: 35_468_950,
        crop_width: 924,
        crop_height: 576,
        total_width: 1135,
        adelay: 0x7f,
        bdelay: 0x72,
        iform: iform::PAL_BDGHI | iform::XT1,
        scaled_total_width: 1135,
        hdelay_x1: 186,
        vdelay: 0x20,
        vbi_pack: 255,
    },
    TuningStandard {
        name: "NTSC",
        fsc: 28_636_363,
        crop_width: 768,
        crop_height: 480,
        total_width: 910,
        adelay: 0x68,
        bdelay: 0x5d,
        iform: iform::NTSC | iform::XT0,
        scaled_total_width: 910,
        hdelay_x1: 128,
        vdelay: 0x1a,
        vbi_pack: 144,
    },
    TuningStandard {
        name: "SECAM",
        fsc: 35_468_950,
        crop_width: 924,
        crop_height: 576,
        total_width: 1135,
        adelay: 0x7f,
        bdelay: 0xb0,
        iform: iform::SECAM | iform::XT1,
        scaled_total_width: 1135,
        hdelay_x1: 186,
        vdelay: 0x20,
        vbi_pack: 255,
    },
    TuningStandard {
        name: "PAL-M",
        fsc: 28_636_363,
        crop_width: 640,
        crop_height: 480,
        total_width: 910,
        adelay: 0x68,
        bdelay: 0x5d,
        iform: iform::PAL_M | iform::XT0,
        scaled_total_width: 780,
        hdelay_x1: 135,
        vdelay: 0x1a,
        vbi_pack: 144,
    },
    TuningStandard {
        name: "PAL-N",
        fsc: 35_468_950,
        crop_width: 768,
        crop_height: 576,
        total_width: 1135,
        adelay: 0x7f,
        bdelay: 0x72,
        iform: iform::PAL_N | iform::XT1,
        scaled_total_width: 944,
        hdelay_x1: 186,
        vdelay: 0x20,
        vbi_pack: 144,
    },
    TuningStandard {
        name: "PAL-NC",
        fsc: 28_636_363,
        crop_width: 640,
        crop_height: 576,
        total_width: 910,
        adelay: 0x68,
        bdelay: 0x5d,
        iform: iform::PAL_NC | iform::XT0,
        scaled_total_width: 780,
        hdelay_x1: 130,
        vdelay: 0x1a,
        vbi_pack: 144,
    },
    TuningStandard {
        name: "NTSC-Japan",
        fsc: 28_636_363,
        crop_width: 640,
        crop_height: 480,
        total_width: 910,
        adelay: 0x68,
        bdelay: 0x5d,
        iform: iform::NTSC_J | iform::XT0,
        scaled_total_width: 780,
        hdelay_x1: 135,
        vdelay: 0x16,
        vbi_pack: 144,
    },
];

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn table_is_indexed_by_norm() {
        for norm in Norm::ALL {
            let index = u8::from(norm);
            assert_eq!(Norm::from_index(index).unwrap(), norm);
            assert!(core::ptr::eq(norm.standard(), &STANDARDS[index as usize]));
        }
        assert!(Norm::from_index(7).is_err());
    }

    #[test]
    fn crystal_follows_line_rate() {
        for standard in STANDARDS.iter() {
            let xtal = standard.iform & (3 << 3);
            match standard.total_width {
                1135 => assert_eq!((xtal, standard.fsc), (iform::XT1, 35_468_950), "{}", standard.name),
                910 => assert_eq!((xtal, standard.fsc), (iform::XT0, 28_636_363), "{}", standard.name),
                other => panic!("unexpected line width {}", other),
            }
            // Sampling runs at half the crystal rate. A line lasts 64us at
            // 625 lines and 63.5us at 525.
            let line_ns = standard.total_width as u64 * 2_000_000_000 / standard.fsc as u64;
            assert!((63_000..=64_100).contains(&line_ns), "{}: {}ns", standard.name, line_ns);
        }
    }

}

// eof
