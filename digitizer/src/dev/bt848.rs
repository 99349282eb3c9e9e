// SPDX-License-Identifier: GPL-3.0-or-later

//! Register map of the Bt848 family video digitizer.
//!
//! Only the registers touched by the capture core are described. Offsets are
//! byte offsets into the memory-mapped register window. The scaler registers
//! come in two banks, one per field; the odd bank sits [`ODD_BANK`] bytes above
//! the even bank and has the same layout.
//!
//! Documentation:
//!     - Bt848/848A/849A "Single-Chip Video Capture for PCI" data sheet
//!     - Bt878/879 data sheet, "PCI Interface" and "RISC Instructions" chapters
//!

use proc_bitfield::bitfield;

/// Device status (video present, H/V lock, field)
pub const DSTATUS: usize = 0x000;

/// Input format: video standard, crystal and mux selection
pub const IFORM: usize = 0x004;

/// Offset of the odd-field copy of each scaler register
pub const ODD_BANK: usize = 0x080;

/// Even-field scaler registers; add [`ODD_BANK`] for the odd field.
pub const E_CROP: usize = 0x00C;
pub const E_VDELAY_LO: usize = 0x010;
pub const E_VACTIVE_LO: usize = 0x014;
pub const E_HDELAY_LO: usize = 0x018;
pub const E_HACTIVE_LO: usize = 0x01C;
pub const E_HSCALE_HI: usize = 0x020;
pub const E_HSCALE_LO: usize = 0x024;
pub const E_VSCALE_HI: usize = 0x04C;
pub const E_VSCALE_LO: usize = 0x050;
pub const E_VTC: usize = 0x06C;

/// AGC delay, calibrated per standard
pub const ADELAY: usize = 0x060;

/// Burst delay, calibrated per standard
pub const BDELAY: usize = 0x064;

/// Pixel format of the odd (high nibble) and even (low nibble) fields
pub const COLOR_FMT: usize = 0x0D4;

/// Byte/word swapping and gamma control
pub const COLOR_CTL: usize = 0x0D8;

/// Which fields (video and VBI) the FIFO captures
pub const CAP_CTL: usize = 0x0DC;

/// VBI samples per line, in dwords (low 8 bits)
pub const VBI_PACK_SIZE: usize = 0x0E0;

/// Interrupt status; bits 0..=27 are write-one-to-clear
pub const INT_STAT: usize = 0x100;

/// Interrupt enable mask, same layout as [`INT_STAT`]
pub const INT_MASK: usize = 0x104;

/// FIFO and RISC sequencer enables
pub const GPIO_DMA_CTL: usize = 0x10C;

/// Bus address the sequencer starts from when enabled
pub const RISC_STRT_ADD: usize = 0x114;

/// Bus address of the instruction the sequencer is fetching
pub const RISC_COUNT: usize = 0x120;

/// Bits of [`INT_STAT`] that a store of one clears. The RISC status nibble
/// reflects the sequencer and cannot be cleared by software.
pub const INT_STAT_W1C_MASK: u32 = 0x0fff_ffff;

bitfield! {

    /// Input format selection
    ///
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct InputFormat(pub u32): FromRaw, IntoRaw {

        /// Use the HACTIVE pin rather than the internal active window
        pub hactive: bool @ 7,

        /// Analog input multiplexer
        pub muxsel: u8 @ 5..=6,

        /// Crystal selection: 1 = XT0 (NTSC rates), 2 = XT1 (PAL rates), 3 = auto
        pub xtal: u8 @ 3..=4,

        /// Video standard decoded by the chip
        pub format: u8 @ 0..=2,

    }

}

bitfield! {

    /// The high bits of the active-window registers, which do not fit in the
    /// 8-bit LO registers. Each field carries bits 9:8 of its register.
    ///
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Crop(pub u32): FromRaw, IntoRaw {

        /// Bits 9:8 of VDELAY
        pub vdelay_hi: u8 @ 6..=7,

        /// Bits 9:8 of VACTIVE
        pub vactive_hi: u8 @ 4..=5,

        /// Bits 9:8 of HDELAY
        pub hdelay_hi: u8 @ 2..=3,

        /// Bits 9:8 of HACTIVE
        pub hactive_hi: u8 @ 0..=1,

    }

}

bitfield! {

    /// Vertical scale, high byte
    ///
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct VScaleHi(pub u32): FromRaw, IntoRaw {

        /// Chroma comb filter
        pub comb: bool @ 6,

        /// Interlaced vertical scaling; each field is scaled on its own
        pub interlaced: bool @ 5,

        /// Bits 12:8 of the 13-bit vertical scale ratio
        pub scale_hi: u8 @ 0..=4,

    }

}

bitfield! {

    /// Vertical timing control
    ///
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct VerticalTiming(pub u32): FromRaw, IntoRaw {

        /// Vertical filter: 0 = 2 tap, 1 = 3 tap, 2 = 4 tap, 3 = 5 tap
        pub vfilt: u8 @ 0..=1,

    }

}

bitfield! {

    /// Interrupt status and mask
    ///
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct IntStatus(pub u32): FromRaw, IntoRaw {

        /// Status bits set and reset by the last RISC instruction carrying them
        pub riscs: u8 @ 28..=31,

        /// The RISC sequencer is enabled
        pub risc_en: bool @ 27,

        /// Field being decoded (set: odd)
        pub field: bool @ 24,

        /// Sync error: the sequencer's SYNC did not match the FIFO
        pub scerr: bool @ 19,

        /// Invalid RISC opcode
        pub ocerr: bool @ 18,

        /// PCI target or master abort
        pub pabort: bool @ 17,

        /// Parity error reading a RISC instruction
        pub riperr: bool @ 16,

        /// Parity error on a data write
        pub pperr: bool @ 15,

        /// FIFO data stream resynchronisation
        pub fdsr: bool @ 14,

        /// FIFO trigger overrun
        pub ftrgt: bool @ 13,

        /// FIFO overrun: the bus could not keep up
        pub fbus: bool @ 12,

        /// A RISC instruction with the IRQ bit completed
        pub risci: bool @ 11,

        /// I2C transfer done
        pub i2cdone: bool @ 8,

        /// Video present changed
        pub vpres: bool @ 5,

        /// Horizontal lock changed
        pub hlock: bool @ 4,

        /// Luma or chroma ADC overflow
        pub oflow: bool @ 3,

        /// Vertical sync
        pub vsync: bool @ 1,

        /// Video format change detected
        pub fmtchg: bool @ 0,

    }

}

bitfield! {

    /// FIFO and sequencer enables
    ///
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DmaControl(pub u32): FromRaw, IntoRaw {

        /// Run the RISC sequencer
        pub risc_enable: bool @ 1,

        /// Run the data FIFO
        pub fifo_enable: bool @ 0,

    }

}

bitfield! {

    /// Which data streams the FIFO collects
    ///
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct CaptureControl(pub u32): FromRaw, IntoRaw {

        /// Capture VBI lines of the odd field
        pub vbi_odd: bool @ 3,

        /// Capture VBI lines of the even field
        pub vbi_even: bool @ 2,

        /// Capture video of the odd field
        pub odd: bool @ 1,

        /// Capture video of the even field
        pub even: bool @ 0,

    }

}

bitfield! {

    /// Pixel output controls
    ///
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ColorControl(pub u32): FromRaw, IntoRaw {

        /// Disable gamma correction removal
        pub gamma: bool @ 4,

        /// Swap 16-bit words on the odd field
        pub wswap_odd: bool @ 3,

        /// Swap 16-bit words on the even field
        pub wswap_even: bool @ 2,

        /// Swap bytes on the odd field
        pub bswap_odd: bool @ 1,

        /// Swap bytes on the even field
        pub bswap_even: bool @ 0,

    }

}

bitfield! {

    /// Output pixel format per field
    ///
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ColorFormat(pub u32): FromRaw, IntoRaw {

        /// Format code for the odd field
        pub odd: u8 @ 4..=7,

        /// Format code for the even field
        pub even: u8 @ 0..=3,

    }

}

/// Interrupts the capture core services
pub fn default_interrupt_mask() -> IntStatus {
    IntStatus(0)
        .with_risci(true)
        .with_scerr(true)
        .with_ocerr(true)
        .with_pabort(true)
        .with_riperr(true)
        .with_pperr(true)
        .with_fbus(true)
}


// eof
