//! Per-note voice state: phase accumulation, envelope/LFO modulation, and
//! stereo rendering of one sounding note.

use std::sync::Arc;

use crate::conversion::{atten_to_amp, key_to_hz};
use crate::envelope::{self, Envelope};
use crate::fixed_point::FixedPoint;
use crate::lfo::Lfo;
use crate::modulator::Modulator;
use crate::soundfont::generator::{
    self, GeneratorId, GeneratorSet, ATTACK_MOD_ENV, ATTACK_VOL_ENV, COARSE_TUNE, DECAY_MOD_ENV,
    DECAY_VOL_ENV, DELAY_MOD_ENV, DELAY_MOD_LFO, DELAY_VIB_LFO, DELAY_VOL_ENV, EXCLUSIVE_CLASS,
    FINE_TUNE, FREQ_MOD_LFO, FREQ_VIB_LFO, HOLD_MOD_ENV, HOLD_VOL_ENV, INITIAL_ATTENUATION,
    KEYNUM, MOD_ENV_TO_PITCH, MOD_LFO_TO_PITCH, MOD_LFO_TO_VOLUME, OVERRIDING_ROOT_KEY, PAN,
    PITCH, RELEASE_MOD_ENV, RELEASE_VOL_ENV, SAMPLE_MODES, SCALE_TUNING, SUSTAIN_MOD_ENV,
    SUSTAIN_VOL_ENV, VELOCITY, VIB_LFO_TO_PITCH,
};
use crate::soundfont::modulator_params::ModulatorParameterSet;
use crate::soundfont::sample::{Sample, SampleMode};

/// How many render frames pass between updates of the vibrato LFO, the
/// modulation envelope, and the pitch recomputation they feed.
pub const CALC_INTERVAL: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Playing,
    Sustained,
    Released,
    Finished,
}

/// Resolved sample extents: absolute sample-frame offsets into the owning
/// SoundFont's PCM pool, after applying the `*AddrsOffset`/`*CoarseOffset`
/// generator pairs.
#[derive(Debug, Clone, Copy)]
struct Extents {
    start: u32,
    end: u32,
    start_loop: u32,
    end_loop: u32,
}

fn resolve_extents(sample: &Sample, generators: &GeneratorSet) -> Extents {
    use generator::{
        END_ADDRS_COARSE_OFFSET, END_ADDRS_OFFSET, END_LOOP_ADDRS_COARSE_OFFSET,
        END_LOOP_ADDRS_OFFSET, START_ADDRS_COARSE_OFFSET, START_ADDRS_OFFSET,
        START_LOOP_ADDRS_COARSE_OFFSET, START_LOOP_ADDRS_OFFSET,
    };
    let offset = |base: u32, coarse: GeneratorId, fine: GeneratorId| -> u32 {
        let delta = 32768 * generators.get_f64(coarse) as i64 + generators.get_f64(fine) as i64;
        (base as i64 + delta).max(0) as u32
    };
    Extents {
        start: offset(sample.start, START_ADDRS_COARSE_OFFSET, START_ADDRS_OFFSET),
        end: offset(sample.end, END_ADDRS_COARSE_OFFSET, END_ADDRS_OFFSET),
        start_loop: offset(
            sample.start_loop,
            START_LOOP_ADDRS_COARSE_OFFSET,
            START_LOOP_ADDRS_OFFSET,
        ),
        end_loop: offset(
            sample.end_loop,
            END_LOOP_ADDRS_COARSE_OFFSET,
            END_LOOP_ADDRS_OFFSET,
        ),
    }
}

pub struct Voice {
    // Immutable for the voice's lifetime.
    note_id: u64,
    actual_key: u8,
    is_percussion: bool,
    extents: Extents,
    sample_mode: SampleMode,
    sample_pitch: f64,
    delta_phase_factor: f64,
    resolved_key: u8,
    actual_velocity: u8,
    exclusive_class: i16,
    /// Cloned from the owning SoundFont's shared pool, so this voice keeps
    /// rendering correctly even if its channel's preset later switches to a
    /// different SoundFont.
    pool: Arc<[i16]>,

    // Mutable.
    generators: GeneratorSet,
    modulators: Vec<Modulator>,
    modulated: [f64; generator::MODULATED_COUNT],
    fine_tuning: f64,
    coarse_tuning: f64,
    frame: u64,
    status: Status,
    phase: FixedPoint,
    delta_phase: FixedPoint,
    volume: (f64, f64),
    vol_env: Envelope,
    mod_env: Envelope,
    mod_lfo: Lfo,
    vib_lfo: Lfo,
    voice_pitch: f64,
}

impl Voice {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        note_id: u64,
        output_rate: f64,
        sample: &Sample,
        pool: Arc<[i16]>,
        generators: GeneratorSet,
        modulators: ModulatorParameterSet,
        key: u8,
        velocity: u8,
        is_percussion: bool,
    ) -> Self {
        let extents = resolve_extents(sample, &generators);
        let sample_mode = SampleMode::from_raw(generators.get_or_default(SAMPLE_MODES));

        let overriding_root_key = generators.get_or_default(OVERRIDING_ROOT_KEY);
        let original_key = if overriding_root_key > 0 {
            overriding_root_key as f64
        } else {
            sample.original_key as f64
        };
        let sample_pitch = original_key - sample.pitch_correction as f64 / 100.0;
        let delta_phase_factor = sample.sample_rate as f64 / (output_rate * key_to_hz(sample_pitch));

        let overridden_velocity = generators.get_or_default(VELOCITY);
        let actual_velocity = if overridden_velocity > 0 {
            overridden_velocity as u8
        } else {
            velocity
        };
        let overridden_key = generators.get_or_default(KEYNUM);
        let resolved_key = if overridden_key > 0 {
            overridden_key as u8
        } else {
            key
        };

        let exclusive_class = generators.get_or_default(EXCLUSIVE_CLASS);

        let mut modulated = [0.0; generator::MODULATED_COUNT];
        for i in 0..generator::GEN_COUNT {
            modulated[i] = generators.get_f64(i);
        }

        let runtime_modulators: Vec<Modulator> = modulators
            .entries()
            .iter()
            .map(|m| Modulator::new(*m))
            .collect();

        let mut voice = Voice {
            note_id,
            actual_key: key,
            is_percussion,
            extents,
            sample_mode,
            sample_pitch,
            delta_phase_factor,
            resolved_key,
            actual_velocity,
            exclusive_class,
            pool,
            generators,
            modulators: runtime_modulators,
            modulated,
            fine_tuning: 0.0,
            coarse_tuning: 0.0,
            frame: 0,
            status: Status::Playing,
            phase: FixedPoint::from_int(extents.start),
            delta_phase: FixedPoint::ZERO,
            volume: (0.0, 0.0),
            vol_env: Envelope::new(envelope::Params::new()),
            mod_env: Envelope::new(envelope::Params::new()),
            mod_lfo: Lfo::new(output_rate / CALC_INTERVAL as f64),
            vib_lfo: Lfo::new(output_rate / CALC_INTERVAL as f64),
            voice_pitch: sample_pitch,
        };

        for dest in [
            PAN,
            DELAY_MOD_LFO,
            FREQ_MOD_LFO,
            DELAY_VIB_LFO,
            FREQ_VIB_LFO,
            DELAY_VOL_ENV,
            ATTACK_VOL_ENV,
            HOLD_VOL_ENV,
            DECAY_VOL_ENV,
            SUSTAIN_VOL_ENV,
            RELEASE_VOL_ENV,
            DELAY_MOD_ENV,
            ATTACK_MOD_ENV,
            HOLD_MOD_ENV,
            DECAY_MOD_ENV,
            SUSTAIN_MOD_ENV,
            RELEASE_MOD_ENV,
            COARSE_TUNE,
        ] {
            voice.update_modulated_params(dest, output_rate);
        }
        voice.delta_phase = FixedPoint::from_real(voice.current_phase_increment());

        voice
    }

    pub fn note_id(&self) -> u64 {
        self.note_id
    }

    pub fn actual_key(&self) -> u8 {
        self.actual_key
    }

    pub fn is_percussion(&self) -> bool {
        self.is_percussion
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status == Status::Finished
    }

    pub fn exclusive_class(&self) -> i16 {
        self.exclusive_class
    }

    pub fn resolved_key(&self) -> u8 {
        self.resolved_key
    }

    pub fn actual_velocity(&self) -> u8 {
        self.actual_velocity
    }

    fn current_phase_increment(&self) -> f64 {
        let cents = self.modulated[MOD_ENV_TO_PITCH] * self.mod_env.value()
            + self.modulated[VIB_LFO_TO_PITCH] * self.vib_lfo.value()
            + self.modulated[MOD_LFO_TO_PITCH] * self.mod_lfo.value();
        self.delta_phase_factor * key_to_hz(self.voice_pitch + 0.01 * cents)
    }

    fn recompute_voice_pitch(&mut self) {
        self.voice_pitch = self.sample_pitch
            + 0.01 * self.modulated[PITCH]
            + 0.01 * self.generators.get_f64(SCALE_TUNING) * (self.resolved_key as f64 - self.sample_pitch)
            + self.coarse_tuning
            + self.modulated[COARSE_TUNE]
            + 0.01 * (self.fine_tuning + self.modulated[FINE_TUNE]);
    }

    fn recompute_volume(&mut self) {
        let pan = self.modulated[PAN];
        let raw = if pan <= -500.0 {
            (1.0, 0.0)
        } else if pan >= 500.0 {
            (0.0, 1.0)
        } else {
            (
                (std::f64::consts::PI / 2000.0 * (500.0 - pan)).sin(),
                (std::f64::consts::PI / 2000.0 * (500.0 + pan)).sin(),
            )
        };
        let atten = atten_to_amp(self.modulated[INITIAL_ATTENUATION]);
        self.volume = (raw.0 * atten, raw.1 * atten);
    }

    /// Recompute `modulated[destination]` from the static generator amount
    /// plus every bound modulator targeting it, then push the new value
    /// into whichever subsystem that destination feeds.
    fn update_modulated_params(&mut self, destination: GeneratorId, output_rate: f64) {
        let base = if destination == PITCH {
            0.0
        } else if destination == INITIAL_ATTENUATION {
            0.4 * self.generators.get_f64(destination)
        } else {
            self.generators.get_f64(destination)
        };
        let modulator_sum: f64 = self
            .modulators
            .iter()
            .filter(|m| m.dest() == destination)
            .map(|m| m.value())
            .sum();
        self.modulated[destination] = base + modulator_sum;

        let calc_rate = output_rate / CALC_INTERVAL as f64;
        match destination {
            PAN | INITIAL_ATTENUATION => self.recompute_volume(),
            DELAY_MOD_LFO => self.mod_lfo.configure(calc_rate, self.modulated[DELAY_MOD_LFO], self.modulated[FREQ_MOD_LFO]),
            FREQ_MOD_LFO => self.mod_lfo.configure(calc_rate, self.modulated[DELAY_MOD_LFO], self.modulated[FREQ_MOD_LFO]),
            DELAY_VIB_LFO => self.vib_lfo.configure(calc_rate, self.modulated[DELAY_VIB_LFO], self.modulated[FREQ_VIB_LFO]),
            FREQ_VIB_LFO => self.vib_lfo.configure(calc_rate, self.modulated[DELAY_VIB_LFO], self.modulated[FREQ_VIB_LFO]),
            DELAY_VOL_ENV | ATTACK_VOL_ENV | HOLD_VOL_ENV | DECAY_VOL_ENV | SUSTAIN_VOL_ENV
            | RELEASE_VOL_ENV => self.reload_vol_env(output_rate),
            DELAY_MOD_ENV | ATTACK_MOD_ENV | HOLD_MOD_ENV | DECAY_MOD_ENV | SUSTAIN_MOD_ENV
            | RELEASE_MOD_ENV => self.reload_mod_env(calc_rate),
            COARSE_TUNE | FINE_TUNE | SCALE_TUNING | PITCH => self.recompute_voice_pitch(),
            _ => {}
        }
    }

    fn reload_vol_env(&mut self, output_rate: f64) {
        let mut params = envelope::Params::new();
        params.set_timecents(envelope::State::Delay, self.modulated[DELAY_VOL_ENV], output_rate);
        params.set_timecents(envelope::State::Attack, self.modulated[ATTACK_VOL_ENV], output_rate);
        params.set_timecents(envelope::State::Hold, self.modulated[HOLD_VOL_ENV], output_rate);
        params.set_timecents(envelope::State::Decay, self.modulated[DECAY_VOL_ENV], output_rate);
        params.set_sustain(self.modulated[SUSTAIN_VOL_ENV]);
        params.set_timecents(envelope::State::Release, self.modulated[RELEASE_VOL_ENV], output_rate);
        let state = self.vol_env.state();
        self.vol_env = Envelope::new(params);
        if state == envelope::State::Release || state == envelope::State::Finished {
            self.vol_env.release();
        }
    }

    fn reload_mod_env(&mut self, calc_rate: f64) {
        let mut params = envelope::Params::new();
        params.set_timecents(envelope::State::Delay, self.modulated[DELAY_MOD_ENV], calc_rate);
        params.set_timecents(envelope::State::Attack, self.modulated[ATTACK_MOD_ENV], calc_rate);
        params.set_timecents(envelope::State::Hold, self.modulated[HOLD_MOD_ENV], calc_rate);
        params.set_timecents(envelope::State::Decay, self.modulated[DECAY_MOD_ENV], calc_rate);
        params.set_sustain(self.modulated[SUSTAIN_MOD_ENV]);
        params.set_timecents(envelope::State::Release, self.modulated[RELEASE_MOD_ENV], calc_rate);
        let state = self.mod_env.state();
        self.mod_env = Envelope::new(params);
        if state == envelope::State::Release || state == envelope::State::Finished {
            self.mod_env.release();
        }
    }

    /// Push a general-controller update (velocity, key, pressure, pitch
    /// wheel, ...) to every bound modulator, recomputing any destination a
    /// touched modulator feeds.
    pub fn push_sf_controller(
        &mut self,
        controller: crate::soundfont::modulator_params::GeneralController,
        value: f64,
        output_rate: f64,
    ) {
        let mut touched_dests: Vec<GeneratorId> = Vec::new();
        for m in &mut self.modulators {
            if m.update_sf_controller(controller, value) {
                touched_dests.push(m.dest());
            }
        }
        touched_dests.sort_unstable();
        touched_dests.dedup();
        for dest in touched_dests {
            self.update_modulated_params(dest, output_rate);
        }
    }

    pub fn push_midi_controller(&mut self, controller: u8, value: f64, output_rate: f64) {
        let mut touched_dests: Vec<GeneratorId> = Vec::new();
        for m in &mut self.modulators {
            if m.update_midi_controller(controller, value) {
                touched_dests.push(m.dest());
            }
        }
        touched_dests.sort_unstable();
        touched_dests.dedup();
        for dest in touched_dests {
            self.update_modulated_params(dest, output_rate);
        }
    }

    pub fn set_fine_tuning(&mut self, cents: f64) {
        self.fine_tuning = cents;
        self.recompute_voice_pitch();
    }

    pub fn set_coarse_tuning(&mut self, semitones: f64) {
        self.coarse_tuning = semitones;
        self.recompute_voice_pitch();
    }

    /// Per-frame state advance: phase accumulation, sample-end/loop
    /// handling, and the every-`CALC_INTERVAL` LFO/envelope/pitch refresh.
    pub fn update(&mut self, output_rate: f64) {
        if self.status == Status::Finished {
            return;
        }

        self.phase += self.delta_phase;
        let i = self.phase.int_part() as u32;

        match self.sample_mode {
            SampleMode::Unlooped | SampleMode::Unused => {
                if i >= self.extents.end.saturating_sub(1) {
                    self.status = Status::Finished;
                    return;
                }
            }
            SampleMode::Looped => {
                if i >= self.extents.end_loop.saturating_sub(1) {
                    let loop_len = FixedPoint::from_int(self.extents.end_loop - self.extents.start_loop);
                    self.phase -= loop_len;
                }
            }
            SampleMode::LoopedWithRemainder => {
                if self.status == Status::Released && i >= self.extents.end.saturating_sub(1) {
                    self.status = Status::Finished;
                    return;
                } else if i >= self.extents.end_loop.saturating_sub(1) {
                    let loop_len = FixedPoint::from_int(self.extents.end_loop - self.extents.start_loop);
                    self.phase -= loop_len;
                }
            }
        }

        self.mod_lfo.update();
        self.vol_env.update();
        if self.vol_env.is_finished() {
            self.status = Status::Finished;
            return;
        }

        self.frame += 1;
        if self.frame % CALC_INTERVAL as u64 == 0 {
            self.vib_lfo.update();
            self.mod_env.update();
            self.delta_phase = FixedPoint::from_real(self.current_phase_increment());
            let _ = output_rate;
        }
    }

    /// Render one stereo sample, reading from the shared PCM pool owned by
    /// this voice's SoundFont.
    pub fn render(&self) -> (f64, f64) {
        let i = self.phase.int_part() as usize;
        let r = self.phase.frac_part();
        let next = self.pool.get(i + 1).copied().unwrap_or(0) as f64;
        let cur = self.pool.get(i).copied().unwrap_or(0) as f64;
        let sample = (1.0 - r) * cur + r * next;

        let lfo_volume = atten_to_amp(self.modulated[MOD_LFO_TO_VOLUME] * self.mod_lfo.value());
        let amp = self.vol_env.value() * lfo_volume / 32767.0;
        (sample * amp * self.volume.0, sample * amp * self.volume.1)
    }

    /// `sustained`: whether the channel's sustain pedal is currently held.
    /// Percussion voices ignore release and play to their natural end.
    pub fn release(&mut self, sustained: bool) {
        if self.is_percussion {
            return;
        }
        if sustained {
            self.status = Status::Sustained;
        } else {
            self.status = Status::Released;
            self.vol_env.release();
            self.mod_env.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soundfont::generator::SAMPLE_ID;
    use crate::soundfont::modulator_params::ModulatorParameterSet;

    fn test_sample() -> Sample {
        Sample {
            name: "tone".into(),
            start: 0,
            end: 1000,
            start_loop: 100,
            end_loop: 900,
            sample_rate: 44100,
            original_key: 60,
            pitch_correction: 0,
        }
    }

    fn test_pool() -> Arc<[i16]> {
        vec![i16::MAX; 2000].into()
    }

    fn make_voice(key: u8, velocity: u8) -> Voice {
        let mut gens = GeneratorSet::new();
        gens.set(SAMPLE_ID, 0);
        Voice::new(
            1,
            44100.0,
            &test_sample(),
            test_pool(),
            gens,
            ModulatorParameterSet::new(),
            key,
            velocity,
            false,
        )
    }

    #[test]
    fn starts_playing_at_sample_start() {
        let voice = make_voice(60, 100);
        assert_eq!(voice.status(), Status::Playing);
        assert_eq!(voice.phase.int_part(), 0);
    }

    #[test]
    fn unlooped_sample_finishes_at_end() {
        let mut gens = GeneratorSet::new();
        gens.set(SAMPLE_ID, 0);
        gens.set(SAMPLE_MODES, 0); // Unlooped
        let mut voice = Voice::new(
            1,
            44100.0,
            &test_sample(),
            test_pool(),
            gens,
            ModulatorParameterSet::new(),
            60,
            100,
            false,
        );
        for _ in 0..5000 {
            voice.update(44100.0);
            if voice.is_finished() {
                break;
            }
        }
        assert!(voice.is_finished());
    }

    #[test]
    fn looped_sample_never_finishes_on_its_own() {
        let mut gens = GeneratorSet::new();
        gens.set(SAMPLE_ID, 0);
        gens.set(SAMPLE_MODES, 1); // Looped
        let mut voice = Voice::new(
            1,
            44100.0,
            &test_sample(),
            test_pool(),
            gens,
            ModulatorParameterSet::new(),
            60,
            100,
            false,
        );
        for _ in 0..20_000 {
            voice.update(44100.0);
        }
        assert!(!voice.is_finished());
    }

    #[test]
    fn percussion_voice_ignores_release() {
        let mut gens = GeneratorSet::new();
        gens.set(SAMPLE_ID, 0);
        gens.set(SAMPLE_MODES, 1);
        let mut voice = Voice::new(
            1,
            44100.0,
            &test_sample(),
            test_pool(),
            gens,
            ModulatorParameterSet::new(),
            60,
            100,
            true,
        );
        voice.release(false);
        assert_eq!(voice.status(), Status::Playing);
    }

    #[test]
    fn render_returns_silence_before_any_envelope_progress() {
        let voice = make_voice(60, 100);
        let (l, r) = voice.render();
        assert_eq!(l, 0.0);
        assert_eq!(r, 0.0);
    }

    #[test]
    fn pan_hard_left_silences_right_channel() {
        let mut gens = GeneratorSet::new();
        gens.set(SAMPLE_ID, 0);
        gens.set(PAN, -500);
        let mut voice = Voice::new(
            1,
            44100.0,
            &test_sample(),
            test_pool(),
            gens,
            ModulatorParameterSet::new(),
            60,
            100,
            false,
        );
        for _ in 0..200 {
            voice.update(44100.0);
        }
        let (_, r) = voice.render();
        assert_eq!(r, 0.0);
    }
}
