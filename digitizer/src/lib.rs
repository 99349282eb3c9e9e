// SPDX-License-Identifier: GPL-3.0-or-later

//! Capture engine for Bt848-family video digitizers
//!
//! Plans scaler geometry, compiles overlay and grab programs for the chip's
//! RISC sequencer, links them into a resident jump table and drives the two
//! grab buffers from the interrupt handler.

pub mod clip;
pub mod config;
pub mod dev;
pub mod device;
pub mod error;
pub mod format;
pub mod geometry;
pub mod grab;
pub mod irq;
pub mod jump;
pub mod norm;
pub mod raw;
pub mod sim;

pub use clip::{ClipRect, FrameBuffer, compile_clip_program};
pub use config::CardConfig;
pub use device::Digitizer;
pub use error::{CaptureError, Result};
pub use format::PixelFormat;
pub use geometry::{CaptureWindow, Geometry, plan_geometry};
pub use grab::SlotState;
pub use irq::IrqOutcome;
pub use jump::JumpTable;
pub use norm::Norm;
pub use raw::{compile_raw_program, compile_vbi_program};

// eof
