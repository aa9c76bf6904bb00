//! # sf2synth
//!
//! A real-time polyphonic software synthesizer that renders a stereo audio
//! stream from SoundFont 2 (SF2) instrument data and live MIDI input.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sf2synth::prelude::*;
//!
//! let synth = SynthesizerSettings::new(44100.0).build();
//! synth.load_sound_font("piano.sf2").unwrap();
//!
//! // Note on: channel 0, key 60, velocity 100.
//! synth.process_short_message(u32::from_le_bytes([0x90, 60, 100, 0]));
//!
//! let (left, right) = synth.render();
//! ```
//!
//! ## Layout
//!
//! Leaf modules ([`conversion`], [`fixed_point`]) feed the SoundFont entity
//! store ([`soundfont`]), which feeds the per-voice synthesis pipeline
//! ([`modulator`], [`envelope`], [`lfo`], [`voice`]), which is driven by
//! [`channel`] and tied together by [`synthesizer`]. [`render`] bridges the
//! render thread to an audio callback; [`settings`] builds a [`Synthesizer`]
//! from a fluent configuration.

pub mod channel;
pub mod conversion;
pub mod envelope;
pub mod error;
pub mod fixed_point;
pub mod lfo;
pub mod midi;
pub mod modulator;
pub mod render;
pub mod settings;
pub mod soundfont;
pub mod synthesizer;
pub mod voice;

pub use error::{Error, Result};
pub use settings::SynthesizerSettings;
pub use synthesizer::{MidiStandard, Synthesizer};

/// Prelude module - import everything you need.
pub mod prelude {
    pub use crate::channel::{Channel, PresetRef};
    pub use crate::error::{Error, Result};
    pub use crate::midi::ShortMessage;
    pub use crate::render::{RenderLoop, RingBuffer};
    pub use crate::settings::SynthesizerSettings;
    pub use crate::soundfont::{Instrument, Preset, Sample, SampleMode, SoundFont, Zone};
    pub use crate::synthesizer::{MidiStandard, Synthesizer};
}
