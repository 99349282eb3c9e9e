// SPDX-License-Identifier: GPL-3.0-or-later

//! Per-card settings, read from TOML

use std::path::Path;

use serde::Deserialize;

use crate::error::{CaptureError, Result};
use crate::norm::Norm;

const fn _default_grab_buffer_size() -> usize { 0x208000 }
const fn _default_program_word_limit() -> usize { 0x10000 }
const fn _default_page_size() -> usize { 4096 }

/// Smallest program word limit that still fits a one-line program
const MIN_PROGRAM_WORDS: usize = 16;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CardConfig {

    /// Video standard selected when the card is opened
    #[serde(default)]
    pub norm: Norm,

    /// Bytes in each grab buffer
    #[serde(default = "_default_grab_buffer_size")]
    pub grab_buffer_size: usize,

    /// Most words one field's program may take
    #[serde(default = "_default_program_word_limit")]
    pub program_word_limit: usize,

    /// Page granularity of DMA buffers
    #[serde(default = "_default_page_size")]
    pub page_size: usize,

    /// Start capturing VBI data as soon as the card is opened
    #[serde(default)]
    pub vbi_on_open: bool,

    /// Leave gamma correction in the output
    #[serde(default)]
    pub gamma: bool,

}

impl Default for CardConfig {
    fn default() -> Self {
        CardConfig {
            norm: Norm::default(),
            grab_buffer_size: _default_grab_buffer_size(),
            program_word_limit: _default_program_word_limit(),
            page_size: _default_page_size(),
            vbi_on_open: false,
            gamma: false,
        }
    }
}

impl CardConfig {

    /// Parses and checks a configuration
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: CardConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration file
    pub fn load<P>(path: P) -> Result<Self>
        where
            P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| CaptureError::Config(format!("{}: {}", path.display(), err)))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.page_size.is_power_of_two() {
            return Err(CaptureError::Config(format!("page size {} is not a power of two", self.page_size)));
        }
        if self.program_word_limit < MIN_PROGRAM_WORDS {
            return Err(CaptureError::Config(format!(
                "program word limit {} is below {}",
                self.program_word_limit, MIN_PROGRAM_WORDS,
            )));
        }
        if self.grab_buffer_size == 0 {
            return Err(CaptureError::Config("grab buffers cannot be empty".into()));
        }
        Ok(())
    }

}


// eof
