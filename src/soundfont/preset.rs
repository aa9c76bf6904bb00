//! Presets and instruments: the two levels of the SF2 zone hierarchy.

use super::zone::Zone;

/// An intermediate grouping of sample zones, referenced by preset zones via
/// the `instrument` generator.
#[derive(Debug, Clone)]
pub struct Instrument {
    pub name: String,
    pub zones: Vec<Zone>,
}

/// A `(bank, program)` pair mapping to a set of zones; what a MIDI program
/// change selects.
#[derive(Debug, Clone)]
pub struct Preset {
    pub name: String,
    pub bank: u16,
    pub program: u8,
    pub zones: Vec<Zone>,
}

impl Preset {
    /// Bank 128 is the SF2 convention for percussion banks.
    pub fn is_percussion(&self) -> bool {
        self.bank == 128
    }
}
