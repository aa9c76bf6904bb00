//! Per-channel MIDI state and the polyphonic voice pool.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::conversion::join_7bit;
use crate::modulator::default_modulators;
use crate::soundfont::generator::{INSTRUMENT, SAMPLE_ID};
use crate::soundfont::modulator_params::{GeneralController, ModulatorParameterSet};
use crate::soundfont::SoundFont;
use crate::voice::{Status, Voice};

const CC_BANK_SELECT_MSB: u8 = 0;
const CC_BANK_SELECT_LSB: u8 = 32;
const CC_EXPRESSION: u8 = 11;
const CC_DATA_ENTRY_MSB: u8 = 6;
const CC_DATA_ENTRY_LSB: u8 = 38;
const CC_VOLUME: u8 = 7;
const CC_PAN: u8 = 10;
const CC_SUSTAIN: u8 = 64;
const CC_NRPN_LSB: u8 = 98;
const CC_NRPN_MSB: u8 = 99;
const CC_RPN_LSB: u8 = 100;
const CC_RPN_MSB: u8 = 101;
const CC_ALL_SOUND_OFF: u8 = 120;
const CC_RESET_ALL_CONTROLLERS: u8 = 121;
const CC_ALL_NOTES_OFF: u8 = 123;

const RPN_PITCH_BEND_SENSITIVITY: u16 = 0;
const RPN_FINE_TUNING: u16 = 1;
const RPN_COARSE_TUNING: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataEntryMode {
    Rpn,
    Nrpn,
}

/// A shared reference to one preset inside one loaded SoundFont. Resolving
/// by index rather than holding a `&Preset` avoids a self-referential
/// borrow while the SoundFont stays reachable via the `Arc`.
#[derive(Clone)]
pub struct PresetRef {
    pub font: Arc<SoundFont>,
    pub index: usize,
}

impl PresetRef {
    fn preset(&self) -> &crate::soundfont::Preset {
        &self.font.presets[self.index]
    }
}

struct State {
    voices: Vec<Voice>,
    controllers: [u8; 128],
    key_pressures: [u8; 128],
    channel_pressure: u8,
    pitch_bend: u16,
    data_entry_mode: DataEntryMode,
    pitch_bend_sensitivity: f64,
    fine_tuning: f64,
    coarse_tuning: f64,
    next_note_id: u64,
    preset: Option<PresetRef>,
    max_polyphony: Option<usize>,
}

impl State {
    fn new(voice_reserve: usize, max_polyphony: Option<usize>) -> Self {
        let mut controllers = [0u8; 128];
        controllers[CC_VOLUME as usize] = 100;
        controllers[CC_PAN as usize] = 64;
        controllers[CC_EXPRESSION as usize] = 127;
        controllers[CC_RPN_MSB as usize] = 127;
        controllers[CC_RPN_LSB as usize] = 127;
        State {
            voices: Vec::with_capacity(voice_reserve),
            controllers,
            key_pressures: [0u8; 128],
            channel_pressure: 0,
            pitch_bend: 8192,
            data_entry_mode: DataEntryMode::Rpn,
            pitch_bend_sensitivity: 2.0,
            fine_tuning: 0.0,
            coarse_tuning: 0.0,
            next_note_id: 0,
            preset: None,
            max_polyphony,
        }
    }

    fn sustain_held(&self) -> bool {
        self.controllers[CC_SUSTAIN as usize] >= 64
    }

    fn for_each_voice_sf(&mut self, controller: GeneralController, value: f64, rate: f64) {
        for v in self.voices.iter_mut().filter(|v| !v.is_finished()) {
            v.push_sf_controller(controller, value, rate);
        }
    }

    fn for_each_voice_midi(&mut self, controller: u8, value: f64, rate: f64) {
        for v in self.voices.iter_mut().filter(|v| !v.is_finished()) {
            v.push_midi_controller(controller, value, rate);
        }
    }

    /// Reuse a `Finished` slot if one exists. Otherwise, once `max_polyphony`
    /// is set and the pool is at capacity, steal the oldest non-`Playing`
    /// voice (or, failing that, the oldest voice outright) rather than
    /// growing the pool further — a REDESIGN addition; unset by default, so
    /// the pool grows unboundedly as in the original engine.
    fn register_voice(&mut self, voice: Voice) {
        if let Some(slot) = self.voices.iter_mut().find(|v| v.is_finished()) {
            *slot = voice;
            return;
        }
        if let Some(cap) = self.max_polyphony {
            if self.voices.len() >= cap {
                let steal = self
                    .voices
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.status() != Status::Playing)
                    .min_by_key(|(_, v)| v.note_id())
                    .or_else(|| self.voices.iter().enumerate().min_by_key(|(_, v)| v.note_id()))
                    .map(|(i, _)| i);
                if let Some(i) = steal {
                    self.voices[i] = voice;
                    return;
                }
            }
        }
        self.voices.push(voice);
    }
}

/// Owns the voice pool and MIDI state for one of the synthesizer's 16
/// channels. All mutation goes through the internal mutex; the MIDI thread
/// and the render thread contend on it, never on a global lock.
pub struct Channel {
    index: usize,
    sample_rate: f64,
    state: Mutex<State>,
}

impl Channel {
    pub fn new(
        index: usize,
        sample_rate: f64,
        voice_reserve: usize,
        max_polyphony: Option<usize>,
    ) -> Self {
        Channel {
            index,
            sample_rate,
            state: Mutex::new(State::new(voice_reserve, max_polyphony)),
        }
    }

    pub fn set_preset(&self, preset: PresetRef) {
        self.state.lock().unwrap().preset = Some(preset);
    }

    pub fn note_off(&self, key: u8) {
        let mut state = self.state.lock().unwrap();
        let sustain = state.sustain_held();
        for v in state.voices.iter_mut() {
            if v.actual_key() == key && !v.is_finished() {
                v.release(sustain);
            }
        }
    }

    pub fn note_on(&self, key: u8, velocity: u8) {
        if velocity == 0 {
            self.note_off(key);
            return;
        }

        let mut state = self.state.lock().unwrap();
        let Some(preset_ref) = state.preset.clone() else {
            debug!(channel = self.index, "note_on with no preset assigned, ignored");
            return;
        };
        let font = preset_ref.font.clone();
        let preset = preset_ref.preset();
        let is_percussion = preset.is_percussion();

        let mut defaults = ModulatorParameterSet::new();
        for d in default_modulators() {
            defaults.append(d);
        }

        for pzone in preset.zones.iter().filter(|z| z.matches(key, velocity)) {
            let inst_amount = pzone.generators.get_or_default(INSTRUMENT);
            if inst_amount < 0 || inst_amount as usize >= font.instruments.len() {
                continue;
            }
            let instrument = &font.instruments[inst_amount as usize];

            for izone in instrument.zones.iter().filter(|z| z.matches(key, velocity)) {
                let sample_amount = izone.generators.get_or_default(SAMPLE_ID);
                if sample_amount < 0 || sample_amount as usize >= font.samples.len() {
                    continue;
                }
                let sample = &font.samples[sample_amount as usize];

                let mut generators = izone.generators.clone();
                generators.add(&pzone.generators);

                let mut modulators = izone.modulators.clone();
                modulators.merge_and_add(&pzone.modulators);
                modulators.merge(&defaults);

                let note_id = state.next_note_id;
                state.next_note_id += 1;

                let mut voice = Voice::new(
                    note_id,
                    self.sample_rate,
                    sample,
                    font.pool.clone(),
                    generators,
                    modulators,
                    key,
                    velocity,
                    is_percussion,
                );

                voice.push_sf_controller(
                    GeneralController::NoteOnVelocity,
                    voice.actual_velocity() as f64,
                    self.sample_rate,
                );
                voice.push_sf_controller(
                    GeneralController::NoteOnKeyNumber,
                    voice.resolved_key() as f64,
                    self.sample_rate,
                );
                voice.push_sf_controller(
                    GeneralController::ChannelPressure,
                    state.channel_pressure as f64,
                    self.sample_rate,
                );
                voice.push_sf_controller(
                    GeneralController::PitchWheel,
                    state.pitch_bend as f64,
                    self.sample_rate,
                );
                voice.push_sf_controller(
                    GeneralController::PitchWheelSensitivity,
                    state.pitch_bend_sensitivity,
                    self.sample_rate,
                );
                for cc in 0..128u8 {
                    let value = state.controllers[cc as usize];
                    voice.push_midi_controller(cc, value as f64, self.sample_rate);
                }
                voice.set_fine_tuning(state.fine_tuning);
                voice.set_coarse_tuning(state.coarse_tuning);

                let class = voice.exclusive_class();
                if class != 0 {
                    for existing in state.voices.iter_mut() {
                        if existing.exclusive_class() == class && !existing.is_finished() {
                            existing.release(false);
                        }
                    }
                }
                state.register_voice(voice);
            }
        }
    }

    pub fn control_change(&self, controller: u8, value: u8) {
        let mut state = self.state.lock().unwrap();
        state.controllers[controller as usize] = value;
        let rate = self.sample_rate;

        match controller {
            CC_DATA_ENTRY_MSB => {
                if state.data_entry_mode == DataEntryMode::Rpn {
                    let rpn = join_7bit(state.controllers[CC_RPN_MSB as usize], state.controllers[CC_RPN_LSB as usize]);
                    let data = join_7bit(value, state.controllers[CC_DATA_ENTRY_LSB as usize]);
                    match rpn {
                        RPN_PITCH_BEND_SENSITIVITY => {
                            state.pitch_bend_sensitivity = value as f64;
                            state.for_each_voice_sf(GeneralController::PitchWheelSensitivity, value as f64, rate);
                        }
                        RPN_FINE_TUNING => {
                            state.fine_tuning = (data as f64 - 8192.0) / 81.92;
                            let cents = state.fine_tuning;
                            for v in state.voices.iter_mut().filter(|v| !v.is_finished()) {
                                v.set_fine_tuning(cents);
                            }
                        }
                        RPN_COARSE_TUNING => {
                            state.coarse_tuning = value as f64 - 64.0;
                            let semitones = state.coarse_tuning;
                            for v in state.voices.iter_mut().filter(|v| !v.is_finished()) {
                                v.set_coarse_tuning(semitones);
                            }
                        }
                        _ => {}
                    }
                }
            }
            CC_SUSTAIN => {
                if value < 64 {
                    for v in state.voices.iter_mut() {
                        if v.status() == crate::voice::Status::Sustained {
                            v.release(false);
                        }
                    }
                }
            }
            CC_NRPN_MSB | CC_NRPN_LSB => state.data_entry_mode = DataEntryMode::Nrpn,
            CC_RPN_MSB | CC_RPN_LSB => state.data_entry_mode = DataEntryMode::Rpn,
            CC_ALL_SOUND_OFF => state.voices.clear(),
            CC_RESET_ALL_CONTROLLERS => {
                state.pitch_bend = 8192;
                state.channel_pressure = 0;
                state.for_each_voice_sf(GeneralController::PitchWheel, 8192.0, rate);
                state.for_each_voice_sf(GeneralController::ChannelPressure, 0.0, rate);
                for cc in 1..121u8 {
                    if (70..=79).contains(&cc) || (91..=95).contains(&cc) {
                        continue;
                    }
                    if matches!(cc, CC_VOLUME | CC_PAN | CC_BANK_SELECT_LSB | CC_ALL_SOUND_OFF) {
                        continue;
                    }
                    let reset_value = if matches!(cc, CC_EXPRESSION | CC_RPN_LSB | CC_RPN_MSB) {
                        127u8
                    } else {
                        0u8
                    };
                    state.controllers[cc as usize] = reset_value;
                    state.for_each_voice_midi(cc, reset_value as f64, rate);
                }
            }
            CC_ALL_NOTES_OFF => {
                for v in state.voices.iter_mut().filter(|v| !v.is_finished()) {
                    v.release(false);
                }
            }
            _ => state.for_each_voice_midi(controller, value as f64, rate),
        }
    }

    pub fn key_pressure(&self, key: u8, pressure: u8) {
        let mut state = self.state.lock().unwrap();
        state.key_pressures[key as usize] = pressure;
        state.for_each_voice_sf(GeneralController::PolyPressure, pressure as f64, self.sample_rate);
    }

    pub fn channel_pressure(&self, pressure: u8) {
        let mut state = self.state.lock().unwrap();
        state.channel_pressure = pressure;
        state.for_each_voice_sf(GeneralController::ChannelPressure, pressure as f64, self.sample_rate);
    }

    pub fn pitch_bend(&self, value: u16) {
        let mut state = self.state.lock().unwrap();
        state.pitch_bend = value;
        state.for_each_voice_sf(GeneralController::PitchWheel, value as f64, self.sample_rate);
    }

    /// Advance every voice one frame and sum their rendered output.
    pub fn render(&self) -> (f64, f64) {
        let mut state = self.state.lock().unwrap();
        let rate = self.sample_rate;
        let mut acc = (0.0, 0.0);
        for v in state.voices.iter_mut() {
            if v.is_finished() {
                continue;
            }
            v.update(rate);
            if v.is_finished() {
                continue;
            }
            let (l, r) = v.render();
            acc.0 += l;
            acc.1 += r;
        }
        acc
    }

    pub fn bank_select(&self) -> (u8, u8) {
        let state = self.state.lock().unwrap();
        (
            state.controllers[CC_BANK_SELECT_MSB as usize],
            state.controllers[CC_BANK_SELECT_LSB as usize],
        )
    }
}
