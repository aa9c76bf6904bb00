//! SF2 modulator parameter tuples and the ordered set operations zones use to
//! combine them.

use super::generator::GeneratorId;

/// The handful of "general" (non-MIDI-CC) controller sources a modulator can
/// reference, per the SF2 spec's `SFGeneralController` enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneralController {
    NoController,
    NoteOnVelocity,
    NoteOnKeyNumber,
    PolyPressure,
    ChannelPressure,
    PitchWheel,
    PitchWheelSensitivity,
    Link,
}

impl GeneralController {
    fn from_index(index: u8) -> Self {
        match index {
            2 => GeneralController::NoteOnVelocity,
            3 => GeneralController::NoteOnKeyNumber,
            10 => GeneralController::PolyPressure,
            13 => GeneralController::ChannelPressure,
            14 => GeneralController::PitchWheel,
            16 => GeneralController::PitchWheelSensitivity,
            127 => GeneralController::Link,
            _ => GeneralController::NoController,
        }
    }
}

/// A modulator source is either a general controller or a raw 7-bit MIDI CC
/// number. Modeled as a tagged variant rather than bit-punning the SF2
/// wire encoding directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    General(GeneralController),
    Midi(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Unipolar,
    Bipolar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    Linear,
    Concave,
    Convex,
    Switch,
}

/// A fully-decoded modulator source: kind plus the three flag bits packed
/// alongside it in the SF2 16-bit `SFModulator` word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source {
    pub kind: SourceKind,
    pub direction: Direction,
    pub polarity: Polarity,
    pub curve: Curve,
}

impl Source {
    pub const NO_CONTROLLER: Source = Source {
        kind: SourceKind::General(GeneralController::NoController),
        direction: Direction::Positive,
        polarity: Polarity::Unipolar,
        curve: Curve::Linear,
    };

    /// Decode the SF2 `SFModulator` 16-bit bitfield: `midi_index = bits[0..6]`,
    /// `palette = bit 7`, `direction = bit 8`, `polarity = bit 9`,
    /// `type = bits[10..15]`.
    pub fn from_raw(raw: u16) -> Self {
        let index = (raw & 0x7F) as u8;
        let is_midi = raw & 0x0080 != 0;
        let direction = if raw & 0x0100 != 0 {
            Direction::Negative
        } else {
            Direction::Positive
        };
        let polarity = if raw & 0x0200 != 0 {
            Polarity::Bipolar
        } else {
            Polarity::Unipolar
        };
        let curve = match (raw >> 10) & 0x3F {
            1 => Curve::Concave,
            2 => Curve::Convex,
            3 => Curve::Switch,
            _ => Curve::Linear,
        };
        let kind = if is_midi {
            SourceKind::Midi(index)
        } else {
            SourceKind::General(GeneralController::from_index(index))
        };
        Source {
            kind,
            direction,
            polarity,
            curve,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Linear,
    AbsoluteValue,
}

impl Transform {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            2 => Transform::AbsoluteValue,
            _ => Transform::Linear,
        }
    }
}

/// One `(src_oper, dest_oper, amount, amt_src_oper, trans_oper)` tuple from a
/// `pmod`/`imod` chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModulatorParam {
    pub src: Source,
    pub dest: GeneratorId,
    pub amount: i16,
    pub amt_src: Source,
    pub transform: Transform,
}

impl ModulatorParam {
    /// Two modulator params are identical iff all fields except `amount`
    /// match.
    fn identical_to(&self, other: &ModulatorParam) -> bool {
        self.src == other.src
            && self.dest == other.dest
            && self.amt_src == other.amt_src
            && self.transform == other.transform
    }

    /// A modulator is non-negative iff its transform discards sign, its
    /// amount is zero, or its amount is positive and both sources are
    /// unipolar (or absent).
    pub fn is_always_non_negative(&self) -> bool {
        if self.transform == Transform::AbsoluteValue || self.amount == 0 {
            return true;
        }
        let unipolar_or_none = |s: &Source| {
            s.polarity == Polarity::Unipolar || s.kind == SourceKind::General(GeneralController::NoController)
        };
        self.amount > 0 && unipolar_or_none(&self.src) && unipolar_or_none(&self.amt_src)
    }
}

/// An ordered list of [`ModulatorParam`] with the SF2 duplicate-suppression
/// and accumulation rules.
#[derive(Debug, Clone, Default)]
pub struct ModulatorParameterSet {
    entries: Vec<ModulatorParam>,
}

impl ModulatorParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ModulatorParam] {
        &self.entries
    }

    fn find_identical(&self, m: &ModulatorParam) -> Option<usize> {
        self.entries.iter().position(|e| e.identical_to(m))
    }

    /// Insert `m` unless an identical entry (ignoring amount) already exists.
    pub fn append(&mut self, m: ModulatorParam) {
        if self.find_identical(&m).is_none() {
            self.entries.push(m);
        }
    }

    /// If an identical entry exists, sum its amount with `m`'s; otherwise
    /// append `m`.
    pub fn add_or_append(&mut self, m: ModulatorParam) {
        if let Some(i) = self.find_identical(&m) {
            self.entries[i].amount = self.entries[i].amount.wrapping_add(m.amount);
        } else {
            self.entries.push(m);
        }
    }

    /// Append every entry of `other` that has no identical counterpart here.
    pub fn merge(&mut self, other: &ModulatorParameterSet) {
        for m in &other.entries {
            self.append(*m);
        }
    }

    /// Like [`merge`](Self::merge) but accumulates amounts on identical
    /// entries instead of discarding them.
    pub fn merge_and_add(&mut self, other: &ModulatorParameterSet) {
        for m in &other.entries {
            self.add_or_append(*m);
        }
    }
}
