// SPDX-License-Identifier: GPL-3.0-or-later

//! Error types for the capture core.

use thiserror::Error;

use crate::clip::MAX_CLIPS;

/// Everything that can go wrong configuring or feeding the capture engine.
///
/// None of these leave the hardware in a new state: when an operation fails,
/// whatever program and register values were installed before stay installed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {

    #[error("grab queue full: {outstanding} requests outstanding")]
    Capacity { outstanding: usize },

    #[error("unsupported format or geometry: {0}")]
    Format(String),

    #[error("could not allocate {words} words of DMA memory for a program")]
    Allocation { words: usize },

    #[error("{count} clip rectangles supplied, at most {} allowed", MAX_CLIPS)]
    ClipOverflow { count: usize },

    #[error("program needs {words} words, limit is {limit}")]
    ProgramTooLarge { words: usize, limit: usize },

    #[error("grab buffer {0} is still queued or being captured")]
    Busy(usize),

    #[error("no grab was submitted to buffer {0}")]
    NotQueued(usize),

    #[error("configuration error: {0}")]
    Config(String),

}

impl From<toml::de::Error> for CaptureError {
    fn from(err: toml::de::Error) -> Self {
        CaptureError::Config(err.to_string())
    }
}

/// Result type alias for capture operations.
pub type Result<T> = core::result::Result<T, CaptureError>;

// eof
