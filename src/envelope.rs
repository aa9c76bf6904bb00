//! Six-phase DAHDSR envelope state machine, shared by the volume and
//! modulation envelope of every voice.

use crate::conversion::{atten_to_amp, timecent_to_second};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Delay,
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
    Finished,
}

/// Durations and the sustain level are stored in one fixed-size array
/// indexed by [`State`], the way the underlying generator set lays them
/// out. The `Sustain` slot holds a normalized `[0, 1]` attenuation level;
/// every other slot holds a duration in update steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct Params {
    durations: [f64; 7],
}

impl Params {
    pub fn new() -> Self {
        Params { durations: [0.0; 7] }
    }

    fn index(state: State) -> usize {
        match state {
            State::Delay => 0,
            State::Attack => 1,
            State::Hold => 2,
            State::Decay => 3,
            State::Sustain => 4,
            State::Release => 5,
            State::Finished => 6,
        }
    }

    /// Set a timing parameter from a raw SF2 timecent amount. `update_rate`
    /// is how many times per second this envelope is stepped (`output_rate`
    /// for the volume envelope, `output_rate / CALC_INTERVAL` for the
    /// modulation envelope).
    pub fn set_timecents(&mut self, state: State, timecents: f64, update_rate: f64) {
        assert_ne!(state, State::Finished, "cannot set duration for Finished");
        assert_ne!(state, State::Sustain, "use set_sustain for the Sustain slot");
        self.durations[Self::index(state)] = update_rate * timecent_to_second(timecents);
    }

    /// The Sustain slot is a level, not a duration: SF2 encodes it as tenths
    /// of a percent of full attenuation (`x` -> `0.001 * x`).
    pub fn set_sustain(&mut self, raw: f64) {
        self.durations[Self::index(State::Sustain)] = (0.001 * raw).clamp(0.0, 1.0);
    }

    fn duration(&self, state: State) -> f64 {
        self.durations[Self::index(state)]
    }

    fn sustain_level(&self) -> f64 {
        self.durations[Self::index(State::Sustain)]
    }
}

/// Running state of one DAHDSR envelope.
#[derive(Debug, Clone)]
pub struct Envelope {
    params: Params,
    state: State,
    steps: f64,
    atten: f64,
    value: f64,
}

impl Envelope {
    pub fn new(params: Params) -> Self {
        Envelope {
            params,
            state: State::Delay,
            steps: 0.0,
            atten: 1.0,
            value: 0.0,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    /// Current envelope output in `[0, 1]` (for Attack, a linear ramp; for
    /// every other state, `atten_to_amp(960 * atten)`, the 960-centibel
    /// compat-factor scaling shared with the attenuation table).
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Advance one update step.
    pub fn update(&mut self) {
        if self.state == State::Finished {
            return;
        }

        self.steps += 1.0;
        while self.state != State::Sustain
            && self.state != State::Finished
            && self.steps >= self.params.duration(self.state)
        {
            self.steps -= self.params.duration(self.state);
            self.state = next_state(self.state);
        }

        match self.state {
            State::Delay => {
                self.atten = 1.0;
                self.value = 0.0;
            }
            State::Attack => {
                let duration = self.params.duration(State::Attack).max(1e-9);
                self.atten = 1.0 - (self.steps / duration).min(1.0);
                self.value = 1.0 - self.atten;
            }
            State::Hold => {
                self.atten = 0.0;
                self.value = atten_to_amp(960.0 * self.atten);
            }
            State::Decay => {
                let duration = self.params.duration(State::Decay).max(1e-9);
                self.atten = self.steps / duration;
                if self.atten >= self.params.sustain_level() {
                    self.atten = self.params.sustain_level();
                    self.steps = 0.0;
                    self.state = State::Sustain;
                }
                self.value = atten_to_amp(960.0 * self.atten);
            }
            State::Sustain => {
                self.atten = self.params.sustain_level();
                self.value = atten_to_amp(960.0 * self.atten);
            }
            State::Release => {
                let duration = self.params.duration(State::Release).max(1e-9);
                self.atten += 1.0 / duration;
                if self.atten >= 1.0 {
                    self.atten = 1.0;
                    self.state = State::Finished;
                }
                self.value = atten_to_amp(960.0 * self.atten);
            }
            State::Finished => {
                self.atten = 1.0;
                self.value = 0.0;
            }
        }
    }

    /// Force an early transition to Release from any pre-Release state.
    pub fn release(&mut self) {
        if self.state != State::Release && self.state != State::Finished {
            self.state = State::Release;
            self.steps = 0.0;
        }
    }
}

fn next_state(state: State) -> State {
    match state {
        State::Delay => State::Attack,
        State::Attack => State::Hold,
        State::Hold => State::Decay,
        State::Decay => State::Sustain,
        State::Sustain => State::Sustain,
        State::Release => State::Finished,
        State::Finished => State::Finished,
    }
}
