//! Channel array, loaded SoundFont list, MIDI/SysEx dispatch, output summation.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::channel::{Channel, PresetRef};
use crate::conversion::join_7bit;
use crate::error::{Error, Result};
use crate::midi::{self, ShortMessage};
use crate::settings::SynthesizerSettings;
use crate::soundfont::SoundFont;

/// Percussion channel by MIDI convention (channel 10, zero-indexed 9).
const PERCUSSION_CHANNEL: usize = 9;

/// The General MIDI variants the synthesizer can track and switch between
/// via `process_short_message`'s program-change bank logic and
/// `process_sys_ex`'s reset patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiStandard {
    Gm,
    Gs,
    Xg,
}

struct Defaults {
    preset: Option<PresetRef>,
    percussion_preset: Option<PresetRef>,
}

/// Top-level engine: owns the channel array, the loaded SoundFont list, and
/// the running MIDI-standard state, and exposes the pull-style render call.
pub struct Synthesizer {
    channels: Vec<Channel>,
    sound_fonts: Mutex<Vec<Arc<SoundFont>>>,
    standard: Mutex<MidiStandard>,
    initial_standard: MidiStandard,
    standard_fixed: bool,
    volume: Mutex<f64>,
    defaults: Mutex<Defaults>,
}

impl Synthesizer {
    pub fn new(settings: SynthesizerSettings) -> Self {
        let channels = (0..settings.channel_count)
            .map(|i| {
                Channel::new(
                    i,
                    settings.sample_rate,
                    settings.voice_reserve,
                    settings.max_polyphony,
                )
            })
            .collect();
        Synthesizer {
            channels,
            sound_fonts: Mutex::new(Vec::new()),
            standard: Mutex::new(settings.initial_standard),
            initial_standard: settings.initial_standard,
            standard_fixed: settings.standard_fixed,
            volume: Mutex::new(1.0),
            defaults: Mutex::new(Defaults { preset: None, percussion_preset: None }),
        }
    }

    /// Ergonomic 4-argument constructor matching the host-facing interface.
    pub fn with_defaults(
        output_rate: f64,
        channel_count: usize,
        initial_standard: MidiStandard,
        standard_fixed: bool,
    ) -> Self {
        let settings = SynthesizerSettings::new(output_rate)
            .channel_count(channel_count)
            .standard(initial_standard)
            .standard_fixed(standard_fixed);
        Synthesizer::new(settings)
    }

    pub fn channel(&self, index: usize) -> Result<&Channel> {
        self.channels.get(index).ok_or(Error::InvalidChannel(index))
    }

    pub fn set_volume(&self, x: f64) {
        *self.volume.lock().unwrap() = x;
    }

    /// Parse and append a SoundFont. The first one loaded seeds the default
    /// melodic (0:0) and percussion (128:0) presets and is assigned to every
    /// channel; channel 9 gets the percussion preset by convention.
    pub fn load_sound_font(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading soundfont");
        let font = Arc::new(SoundFont::load(path)?);
        info!(
            name = %font.name,
            presets = font.presets.len(),
            instruments = font.instruments.len(),
            samples = font.samples.len(),
            "soundfont loaded"
        );

        let mut fonts = self.sound_fonts.lock().unwrap();
        let is_first = fonts.is_empty();
        fonts.push(font.clone());
        drop(fonts);

        if is_first {
            let melodic = font
                .presets
                .iter()
                .position(|p| p.bank == 0 && p.program == 0)
                .map(|index| PresetRef { font: font.clone(), index });
            let percussion = font
                .presets
                .iter()
                .position(|p| p.bank == 128 && p.program == 0)
                .map(|index| PresetRef { font: font.clone(), index });

            if melodic.is_none() {
                warn!("soundfont has no default preset 0:0");
            }
            if percussion.is_none() {
                warn!("soundfont has no default percussion preset 128:0");
            }

            let mut defaults = self.defaults.lock().unwrap();
            defaults.preset = melodic.clone();
            defaults.percussion_preset = percussion.clone();
            drop(defaults);

            for (i, channel) in self.channels.iter().enumerate() {
                let assigned = if i == PERCUSSION_CHANNEL { percussion.clone().or_else(|| melodic.clone()) } else { melodic.clone() };
                if let Some(preset) = assigned {
                    channel.set_preset(preset);
                }
            }
        }

        Ok(())
    }

    /// Linear scan across loaded SoundFonts in load order, with the GM/
    /// percussion fallback ladder described for the engine.
    pub fn find_preset(&self, bank: u16, program: u8) -> Result<PresetRef> {
        let fonts = self.sound_fonts.lock().unwrap();
        for font in fonts.iter() {
            if let Some(index) = font.presets.iter().position(|p| p.bank == bank && p.program == program) {
                return Ok(PresetRef { font: font.clone(), index });
            }
        }
        drop(fonts);

        if bank == 128 && program != 0 {
            let defaults = self.defaults.lock().unwrap();
            if let Some(preset) = defaults.percussion_preset.clone() {
                warn!(bank, program, "falling back to default percussion preset");
                return Ok(preset);
            }
            return Err(Error::PresetNotFound { bank: 128, program: 0 });
        }
        if bank != 0 {
            warn!(bank, program, "no preset for bank, retrying bank 0");
            return self.find_preset(0, program);
        }
        let defaults = self.defaults.lock().unwrap();
        if let Some(preset) = defaults.preset.clone() {
            warn!(bank, program, "falling back to default preset");
            return Ok(preset);
        }
        Err(Error::PresetNotFound { bank, program })
    }

    /// Unpack one packed 32-bit MIDI short message and route it to the
    /// addressed channel.
    pub fn process_short_message(&self, packed: u32) {
        let msg = ShortMessage::unpack(packed);
        let ShortMessage { status, channel: channel_index, data1, data2 } = msg;
        let Ok(channel) = self.channel(channel_index as usize) else {
            return;
        };

        match status {
            midi::NOTE_OFF => channel.note_off(data1),
            midi::NOTE_ON => channel.note_on(data1, data2),
            midi::KEY_PRESSURE => channel.key_pressure(data1, data2),
            midi::CONTROL_CHANGE => channel.control_change(data1, data2),
            midi::PROGRAM_CHANGE => {
                let (bank_msb, bank_lsb) = channel.bank_select();
                let standard = *self.standard.lock().unwrap();
                let mut sf_bank = match standard {
                    MidiStandard::Gm => 0u16,
                    MidiStandard::Gs => bank_msb as u16,
                    MidiStandard::Xg => {
                        if bank_msb == 127 {
                            128
                        } else {
                            bank_lsb as u16
                        }
                    }
                };
                if channel_index as usize == PERCUSSION_CHANNEL {
                    sf_bank = 128;
                }
                match self.find_preset(sf_bank, data1) {
                    Ok(preset) => channel.set_preset(preset),
                    Err(e) => warn!(error = %e, "program change dropped"),
                }
            }
            midi::CHANNEL_PRESSURE => channel.channel_pressure(data1),
            midi::PITCH_BEND => channel.pitch_bend(join_7bit(data2, data1)),
            _ => {}
        }
    }

    /// Process a raw System Exclusive byte sequence. Ignored entirely when
    /// `standard_fixed` is set.
    pub fn process_sys_ex(&self, bytes: &[u8]) {
        if self.standard_fixed {
            return;
        }

        let mut standard = self.standard.lock().unwrap();
        if midi::matches_sysex_pattern(bytes, midi::GM_SYSTEM_ON) {
            *standard = MidiStandard::Gm;
            info!("GM system on");
        } else if midi::matches_sysex_pattern(bytes, midi::GM_SYSTEM_OFF) {
            *standard = self.initial_standard;
            info!(standard = ?self.initial_standard, "GM system off, standard restored");
        } else if midi::matches_sysex_pattern(bytes, midi::GS_RESET)
            || midi::matches_sysex_pattern(bytes, midi::GS_SYSTEM_MODE_SET_A)
            || midi::matches_sysex_pattern(bytes, midi::GS_SYSTEM_MODE_SET_B)
        {
            *standard = MidiStandard::Gs;
            info!("GS reset");
        } else if midi::matches_sysex_pattern(bytes, midi::XG_SYSTEM_ON) {
            *standard = MidiStandard::Xg;
            info!("XG system on");
        } else {
            warn!(len = bytes.len(), "unrecognized sysex message ignored");
        }
    }

    /// Render one stereo sample: `update()` then `render()` every channel,
    /// sum, and apply the master volume.
    pub fn render(&self) -> (f64, f64) {
        let volume = *self.volume.lock().unwrap();
        let mut acc = (0.0, 0.0);
        for channel in &self.channels {
            let (l, r) = channel.render();
            acc.0 += l;
            acc.1 += r;
        }
        (acc.0 * volume, acc.1 * volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SynthesizerSettings {
        SynthesizerSettings::new(44100.0)
    }

    #[test]
    fn new_synthesizer_has_sixteen_channels_by_default() {
        let synth = Synthesizer::new(settings());
        assert!(synth.channel(15).is_ok());
        assert!(synth.channel(16).is_err());
    }

    #[test]
    fn find_preset_on_empty_soundfont_list_fails() {
        let synth = Synthesizer::new(settings());
        assert!(synth.find_preset(0, 0).is_err());
    }

    #[test]
    fn process_short_message_routes_by_channel_nibble() {
        let synth = Synthesizer::new(settings());
        let packed = u32::from_le_bytes([0xB3, midi::CC_BANK_SELECT_MSB, 5, 0]);
        synth.process_short_message(packed);
        assert_eq!(synth.channel(3).unwrap().bank_select().0, 5);
        assert!(synth.channel(4).unwrap().bank_select().0 != 5);
    }

    #[test]
    fn sys_ex_ignored_when_standard_fixed() {
        let settings = settings().standard_fixed(true);
        let synth = Synthesizer::new(settings);
        synth.process_sys_ex(midi::GS_RESET);
        assert_eq!(*synth.standard.lock().unwrap(), MidiStandard::Gm);
    }

    #[test]
    fn sys_ex_gm_off_restores_initial_standard() {
        let settings = settings().standard(MidiStandard::Gs);
        let synth = Synthesizer::new(settings);
        synth.process_sys_ex(midi::GM_SYSTEM_ON);
        assert_eq!(*synth.standard.lock().unwrap(), MidiStandard::Gm);
        synth.process_sys_ex(midi::GM_SYSTEM_OFF);
        assert_eq!(*synth.standard.lock().unwrap(), MidiStandard::Gs);
    }

    #[test]
    fn render_with_no_fonts_is_silent() {
        let synth = Synthesizer::new(settings());
        assert_eq!(synth.render(), (0.0, 0.0));
    }

    fn font_with_only_default_preset() -> Arc<SoundFont> {
        use crate::soundfont::Preset;
        Arc::new(SoundFont {
            name: "only-default".into(),
            pool: vec![0i16; 16].into(),
            samples: vec![],
            instruments: vec![],
            presets: vec![Preset { name: "default".into(), bank: 0, program: 0, zones: vec![] }],
        })
    }

    #[test]
    fn find_preset_unknown_bank_falls_back_to_bank_zero() {
        let synth = Synthesizer::new(settings());
        synth.sound_fonts.lock().unwrap().push(font_with_only_default_preset());
        synth.defaults.lock().unwrap().preset =
            Some(PresetRef { font: font_with_only_default_preset(), index: 0 });

        let found = synth.find_preset(5, 10).unwrap();
        assert_eq!(found.font.presets[found.index].bank, 0);
    }

    #[test]
    fn find_preset_percussion_without_default_percussion_fails() {
        let synth = Synthesizer::new(settings());
        synth.sound_fonts.lock().unwrap().push(font_with_only_default_preset());
        assert!(synth.find_preset(128, 3).is_err());
    }
}
