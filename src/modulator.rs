//! Runtime modulator evaluation: maps one or two controller sources through
//! a shaping curve and combines them into a signed contribution to a
//! generator destination.

use crate::soundfont::generator::GeneratorId;
use crate::soundfont::modulator_params::{
    Curve, Direction, GeneralController, ModulatorParam, Polarity, Source, SourceKind, Transform,
};

fn concave(x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    (2.0 * amp_to_norm_atten(1.0 - x)).clamp(0.0, 1.0)
}

fn convex(x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    (1.0 - 2.0 * amp_to_norm_atten(x)).clamp(0.0, 1.0)
}

fn amp_to_norm_atten(a: f64) -> f64 {
    -20.0 / 96.0 * a.log10()
}

/// Apply a modulator source's normalize → direction → polarity/curve
/// pipeline to a raw controller value.
fn map(value: f64, source: Source) -> f64 {
    let v = if source.kind == SourceKind::General(GeneralController::PitchWheel) {
        value / 16384.0
    } else {
        value / 128.0
    };

    match source.polarity {
        Polarity::Unipolar => {
            let x = match source.direction {
                Direction::Positive => v,
                Direction::Negative => 1.0 - v,
            };
            match source.curve {
                Curve::Linear => x,
                Curve::Concave => concave(x),
                Curve::Convex => convex(x),
                Curve::Switch => {
                    if x >= 0.5 {
                        1.0
                    } else {
                        0.0
                    }
                }
            }
        }
        Polarity::Bipolar => {
            let sign = if v > 0.5 { 1.0 } else { -1.0 };
            let dir = match source.direction {
                Direction::Positive => 1.0,
                Direction::Negative => -1.0,
            };
            let x_prime = 2.0 * v - 1.0;
            match source.curve {
                Curve::Linear => dir * x_prime,
                Curve::Concave => sign * dir * concave(sign * x_prime),
                Curve::Convex => sign * dir * convex(sign * x_prime),
                Curve::Switch => {
                    if v >= 0.5 {
                        1.0
                    } else {
                        -1.0
                    }
                }
            }
        }
    }
}

/// A constant "no controller" source always contributes full scale (1.0).
fn initial_value(source: Source) -> f64 {
    match source.kind {
        SourceKind::General(GeneralController::NoController) => 1.0,
        _ => 0.0,
    }
}

/// Bound to one [`ModulatorParam`]; caches the last mapped value of each
/// source so `value()` is O(1) between controller changes.
#[derive(Debug, Clone)]
pub struct Modulator {
    param: ModulatorParam,
    source: f64,
    amt_source: f64,
    value: f64,
}

impl Modulator {
    pub fn new(param: ModulatorParam) -> Self {
        let source = initial_value(param.src);
        let amt_source = initial_value(param.amt_src);
        let mut m = Modulator {
            param,
            source,
            amt_source,
            value: 0.0,
        };
        m.recompute();
        m
    }

    pub fn dest(&self) -> GeneratorId {
        self.param.dest
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn is_always_non_negative(&self) -> bool {
        self.param.is_always_non_negative()
    }

    fn recompute(&mut self) {
        let raw = self.param.amount as f64 * self.source * self.amt_source;
        self.value = match self.param.transform {
            Transform::Linear => raw,
            Transform::AbsoluteValue => raw.abs(),
        };
    }

    /// Recompute whichever side(s) of this modulator reference `controller`,
    /// using a raw value already normalized to MIDI's native 0..128 scale
    /// (or 0..16384 for pitch wheel sources, handled internally by `map`).
    pub fn update_sf_controller(&mut self, controller: GeneralController, value: f64) -> bool {
        let mut touched = false;
        if self.param.src.kind == SourceKind::General(controller) {
            self.source = map(value, self.param.src);
            touched = true;
        }
        if self.param.amt_src.kind == SourceKind::General(controller) {
            self.amt_source = map(value, self.param.amt_src);
            touched = true;
        }
        if touched {
            self.recompute();
        }
        touched
    }

    pub fn update_midi_controller(&mut self, controller: u8, value: f64) -> bool {
        let mut touched = false;
        if self.param.src.kind == SourceKind::Midi(controller) {
            self.source = map(value, self.param.src);
            touched = true;
        }
        if self.param.amt_src.kind == SourceKind::Midi(controller) {
            self.amt_source = map(value, self.param.amt_src);
            touched = true;
        }
        if touched {
            self.recompute();
        }
        touched
    }
}

/// Amounts and curves are transcribed from the SF2 spec's "default
/// modulators" table (§8.4.2); these are merged into every voice's
/// modulator set as lowest priority.
pub fn default_modulators() -> Vec<ModulatorParam> {
    use crate::soundfont::generator::{
        CHORUS_EFFECTS_SEND, INITIAL_ATTENUATION, INITIAL_FILTER_FC, PAN, REVERB_EFFECTS_SEND,
        VIB_LFO_TO_PITCH,
    };

    vec![
        // MIDI Note-On Velocity to Initial Attenuation (concave, negative), amount 960.
        ModulatorParam {
            src: Source {
                kind: SourceKind::General(GeneralController::NoteOnVelocity),
                direction: Direction::Negative,
                polarity: Polarity::Unipolar,
                curve: Curve::Concave,
            },
            dest: INITIAL_ATTENUATION,
            amount: 960,
            amt_src: Source::NO_CONTROLLER,
            transform: Transform::Linear,
        },
        // MIDI Note-On Velocity to Filter Cutoff (linear, negative), amount -2400.
        ModulatorParam {
            src: Source {
                kind: SourceKind::General(GeneralController::NoteOnVelocity),
                direction: Direction::Negative,
                polarity: Polarity::Unipolar,
                curve: Curve::Linear,
            },
            dest: INITIAL_FILTER_FC,
            amount: -2400,
            amt_src: Source::NO_CONTROLLER,
            transform: Transform::Linear,
        },
        // MIDI Channel Pressure to Vibrato LFO Pitch Depth, amount 50.
        ModulatorParam {
            src: Source {
                kind: SourceKind::General(GeneralController::ChannelPressure),
                direction: Direction::Positive,
                polarity: Polarity::Unipolar,
                curve: Curve::Linear,
            },
            dest: VIB_LFO_TO_PITCH,
            amount: 50,
            amt_src: Source::NO_CONTROLLER,
            transform: Transform::Linear,
        },
        // MIDI CC1 (Modulation Wheel) to Vibrato LFO Pitch Depth, amount 50.
        ModulatorParam {
            src: Source {
                kind: SourceKind::Midi(1),
                direction: Direction::Positive,
                polarity: Polarity::Unipolar,
                curve: Curve::Linear,
            },
            dest: VIB_LFO_TO_PITCH,
            amount: 50,
            amt_src: Source::NO_CONTROLLER,
            transform: Transform::Linear,
        },
        // MIDI CC7 (Volume) to Initial Attenuation, amount 960 (concave, negative).
        ModulatorParam {
            src: Source {
                kind: SourceKind::Midi(7),
                direction: Direction::Negative,
                polarity: Polarity::Unipolar,
                curve: Curve::Concave,
            },
            dest: INITIAL_ATTENUATION,
            amount: 960,
            amt_src: Source::NO_CONTROLLER,
            transform: Transform::Linear,
        },
        // MIDI CC10 (Pan) to Pan, amount 1000 (bipolar, linear).
        ModulatorParam {
            src: Source {
                kind: SourceKind::Midi(10),
                direction: Direction::Positive,
                polarity: Polarity::Bipolar,
                curve: Curve::Linear,
            },
            dest: PAN,
            amount: 1000,
            amt_src: Source::NO_CONTROLLER,
            transform: Transform::Linear,
        },
        // MIDI CC11 (Expression) to Initial Attenuation, amount 960 (concave, negative).
        ModulatorParam {
            src: Source {
                kind: SourceKind::Midi(11),
                direction: Direction::Negative,
                polarity: Polarity::Unipolar,
                curve: Curve::Concave,
            },
            dest: INITIAL_ATTENUATION,
            amount: 960,
            amt_src: Source::NO_CONTROLLER,
            transform: Transform::Linear,
        },
        // MIDI CC91 (Reverb Send) to Reverb Effects Send, amount 200.
        ModulatorParam {
            src: Source {
                kind: SourceKind::Midi(91),
                direction: Direction::Positive,
                polarity: Polarity::Unipolar,
                curve: Curve::Linear,
            },
            dest: REVERB_EFFECTS_SEND,
            amount: 200,
            amt_src: Source::NO_CONTROLLER,
            transform: Transform::Linear,
        },
        // MIDI CC93 (Chorus Send) to Chorus Effects Send, amount 200.
        ModulatorParam {
            src: Source {
                kind: SourceKind::Midi(93),
                direction: Direction::Positive,
                polarity: Polarity::Unipolar,
                curve: Curve::Linear,
            },
            dest: CHORUS_EFFECTS_SEND,
            amount: 200,
            amt_src: Source::NO_CONTROLLER,
            transform: Transform::Linear,
        },
        // Pitch Wheel x Pitch Wheel Sensitivity to Pitch, amount 12700 (bipolar, linear).
        ModulatorParam {
            src: Source {
                kind: SourceKind::General(GeneralController::PitchWheel),
                direction: Direction::Positive,
                polarity: Polarity::Bipolar,
                curve: Curve::Linear,
            },
            dest: crate::soundfont::generator::PITCH,
            amount: 12700,
            amt_src: Source {
                kind: SourceKind::General(GeneralController::PitchWheelSensitivity),
                direction: Direction::Positive,
                polarity: Polarity::Unipolar,
                curve: Curve::Linear,
            },
            transform: Transform::Linear,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soundfont::generator::INITIAL_ATTENUATION;

    fn velocity_modulator(amount: i16) -> ModulatorParam {
        ModulatorParam {
            src: Source {
                kind: SourceKind::General(GeneralController::NoteOnVelocity),
                direction: Direction::Negative,
                polarity: Polarity::Unipolar,
                curve: Curve::Concave,
            },
            dest: INITIAL_ATTENUATION,
            amount,
            amt_src: Source::NO_CONTROLLER,
            transform: Transform::Linear,
        }
    }

    #[test]
    fn no_controller_source_is_constant_one() {
        let m = Modulator::new(velocity_modulator(0));
        // amount 0 -> value is always 0 regardless of source.
        assert_eq!(m.value(), 0.0);
    }

    #[test]
    fn full_velocity_yields_zero_attenuation_contribution() {
        let mut m = Modulator::new(velocity_modulator(960));
        m.update_sf_controller(GeneralController::NoteOnVelocity, 127.0);
        assert!(m.value().abs() < 1.0, "got {}", m.value());
    }

    #[test]
    fn zero_velocity_yields_full_attenuation_contribution() {
        let mut m = Modulator::new(velocity_modulator(960));
        m.update_sf_controller(GeneralController::NoteOnVelocity, 0.0);
        assert!((m.value() - 960.0).abs() < 1.0, "got {}", m.value());
    }

    #[test]
    fn unrelated_controller_does_not_touch_value() {
        let mut m = Modulator::new(velocity_modulator(960));
        let before = m.value();
        m.update_midi_controller(7, 50.0);
        assert_eq!(m.value(), before);
    }

    #[test]
    fn absolute_value_transform_rectifies() {
        let mut param = velocity_modulator(-960);
        param.transform = Transform::AbsoluteValue;
        let mut m = Modulator::new(param);
        m.update_sf_controller(GeneralController::NoteOnVelocity, 0.0);
        assert!(m.value() >= 0.0);
    }

    #[test]
    fn default_modulators_has_ten_entries() {
        assert_eq!(default_modulators().len(), 10);
    }
}
