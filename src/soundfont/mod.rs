//! SoundFont 2 (SF2) file parsing and the entity graph it produces.

pub mod generator;
pub mod modulator_params;
mod parser;
mod riff;
pub mod preset;
pub mod sample;
pub mod zone;

pub use preset::{Instrument, Preset};
pub use sample::{Sample, SampleMode};
pub use zone::Zone;

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

/// A fully-parsed SoundFont: immutable after load, owning the shared PCM
/// pool that every voice reads from by index. Each voice clones the `Arc`
/// rather than borrowing, since it may outlive a `Channel::set_preset` that
/// switches to a different SoundFont.
#[derive(Debug)]
pub struct SoundFont {
    pub name: String,
    /// Shared contiguous pool of signed 16-bit PCM samples. Every
    /// [`Sample`] descriptor indexes into this array by sample-frame offset.
    pub pool: Arc<[i16]>,
    pub samples: Vec<Sample>,
    pub instruments: Vec<Instrument>,
    pub presets: Vec<Preset>,
}

impl SoundFont {
    /// Parse a `.sf2` file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<SoundFont> {
        parser::load(path.as_ref())
    }

    /// Parse an in-memory RIFF/SF2 byte buffer, e.g. one embedded with
    /// `include_bytes!`.
    pub fn load_bytes(bytes: &[u8]) -> Result<SoundFont> {
        parser::load_bytes(bytes)
    }

    pub fn find_preset(&self, bank: u16, program: u8) -> Option<&Preset> {
        self.presets
            .iter()
            .find(|p| p.bank == bank && p.program == program)
    }
}
