//! Fluent construction of a [`Synthesizer`](crate::synthesizer::Synthesizer).

use crate::synthesizer::{MidiStandard, Synthesizer};

/// Configuration for a [`Synthesizer`], built with chained setters and
/// consumed by [`build`](Self::build).
#[derive(Debug, Clone, Copy)]
pub struct SynthesizerSettings {
    pub(crate) sample_rate: f64,
    pub(crate) channel_count: usize,
    pub(crate) initial_standard: MidiStandard,
    pub(crate) standard_fixed: bool,
    pub(crate) voice_reserve: usize,
    pub(crate) max_polyphony: Option<usize>,
}

impl SynthesizerSettings {
    pub fn new(sample_rate: f64) -> Self {
        SynthesizerSettings {
            sample_rate,
            channel_count: 16,
            initial_standard: MidiStandard::Gm,
            standard_fixed: false,
            voice_reserve: 128,
            max_polyphony: None,
        }
    }

    pub fn channel_count(mut self, n: usize) -> Self {
        self.channel_count = n;
        self
    }

    pub fn standard(mut self, standard: MidiStandard) -> Self {
        self.initial_standard = standard;
        self
    }

    pub fn standard_fixed(mut self, fixed: bool) -> Self {
        self.standard_fixed = fixed;
        self
    }

    pub fn voice_reserve(mut self, n: usize) -> Self {
        self.voice_reserve = n;
        self
    }

    /// A soft per-channel polyphony cap. Unset (the default) leaves the
    /// voice pool unbounded, matching the reference engine's behavior.
    pub fn max_polyphony(mut self, n: usize) -> Self {
        self.max_polyphony = Some(n);
        self
    }

    pub fn build(self) -> Synthesizer {
        Synthesizer::new(self)
    }
}
