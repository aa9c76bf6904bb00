//! Zones: the (key range, velocity range, generators, modulators) tuples
//! that make up a preset or instrument.

use super::generator::{GeneratorSet, Range};
use super::modulator_params::ModulatorParameterSet;

/// A single zone of a preset or instrument. Selected for a noteOn when both
/// ranges contain `(key, velocity)`.
#[derive(Debug, Clone, Default)]
pub struct Zone {
    pub key_range: Range,
    pub vel_range: Range,
    pub generators: GeneratorSet,
    pub modulators: ModulatorParameterSet,
}

impl Zone {
    pub fn matches(&self, key: u8, velocity: u8) -> bool {
        self.key_range.contains(key) && self.vel_range.contains(velocity)
    }

    /// Fold the global zone's generators and modulators into this zone
    /// (fills only the slots this zone left unused).
    pub fn inherit_from_global(&mut self, global: &Zone) {
        self.generators.merge(&global.generators);
        self.modulators.merge(&global.modulators);
    }
}
