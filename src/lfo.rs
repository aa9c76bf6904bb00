//! Triangle low-frequency oscillator with a delayed start, used for both
//! the modulation and vibrato LFOs of a voice.

use crate::conversion::{absolute_cent_to_hz, timecent_to_second};

#[derive(Debug, Clone)]
pub struct Lfo {
    delay: f64,
    delta: f64,
    steps: f64,
    value: f64,
    rising: bool,
}

impl Lfo {
    /// `update_rate` is how many times per second [`update`](Self::update)
    /// is called (e.g. `output_rate / CALC_INTERVAL`).
    pub fn new(update_rate: f64) -> Self {
        Lfo {
            delay: 0.0,
            delta: 0.0,
            steps: 0.0,
            value: 0.0,
            rising: true,
        }
        .with_rate(update_rate)
    }

    fn with_rate(mut self, update_rate: f64) -> Self {
        self.set_rate(update_rate, -12000.0, -12000.0);
        self
    }

    fn set_rate(&mut self, update_rate: f64, delay_timecents: f64, freq_absolute_cents: f64) {
        self.delay = update_rate * timecent_to_second(delay_timecents);
        self.delta = 4.0 * absolute_cent_to_hz(freq_absolute_cents) / update_rate;
    }

    /// Reconfigure the delay/frequency from raw SF2 generator amounts
    /// without resetting phase.
    pub fn configure(&mut self, update_rate: f64, delay_timecents: f64, freq_absolute_cents: f64) {
        self.set_rate(update_rate, delay_timecents, freq_absolute_cents);
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn update(&mut self) {
        self.steps += 1.0;
        if self.steps < self.delay {
            self.value = 0.0;
            return;
        }

        if self.rising {
            self.value += self.delta;
            if self.value > 1.0 {
                self.value = 2.0 - self.value;
                self.rising = false;
            }
        } else {
            self.value -= self.delta;
            if self.value < -1.0 {
                self.value = -2.0 - self.value;
                self.rising = true;
            }
        }
    }
}
