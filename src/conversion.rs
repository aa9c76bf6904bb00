//! Unit conversion tables and helpers shared across the synthesis pipeline.
//!
//! SoundFont generator amounts are expressed in log-domain units (centibels,
//! timecents, absolute cents) because that is what makes envelope and pitch
//! math additive. Everything downstream wants plain ratios and Hz, so these
//! lookup tables are built once and shared by every voice.

use std::sync::OnceLock;

/// Number of entries in the centibel→amplitude table (0 to 144.0 dB in 0.1 dB steps).
const ATTEN_TABLE_LEN: usize = 1441;

/// Number of entries in the cents→Hz table (one octave, 0..1200 cents).
const CENT_TABLE_LEN: usize = 1200;

struct Tables {
    atten_to_amp: Vec<f64>,
    cent_to_hz: Vec<f64>,
}

fn tables() -> &'static Tables {
    static TABLES: OnceLock<Tables> = OnceLock::new();
    TABLES.get_or_init(|| {
        // Compat factor: the reference engine uses `10^(-i/200)` here instead of
        // the SF2-specified `10^(-i/100)`, compensating with a 960 (not 480)
        // centibel full-scale factor wherever the table is consulted (see
        // Envelope::value and Voice::update_modulated_params). Preserved as-is.
        let atten_to_amp = (0..ATTEN_TABLE_LEN)
            .map(|i| 10f64.powf(-(i as f64) / 200.0))
            .collect();

        // One octave above 6.875 Hz.
        let cent_to_hz = (0..CENT_TABLE_LEN)
            .map(|i| 6.875 * 2f64.powf(i as f64 / 1200.0))
            .collect();

        Tables { atten_to_amp, cent_to_hz }
    })
}

/// Convert a centibel attenuation amount to a linear amplitude ratio.
///
/// Values at or below zero return full amplitude; values past the end of the
/// table return silence. Fractional input is truncated to the table index.
pub fn atten_to_amp(centibels: f64) -> f64 {
    if centibels <= 0.0 {
        return 1.0;
    }
    let table = &tables().atten_to_amp;
    let index = centibels.floor() as usize;
    if index >= table.len() {
        return 0.0;
    }
    table[index]
}

/// Octave-bracket thresholds (in cents) used by [`key_to_hz`], mirroring the
/// reference engine's table-walk rather than a direct `2^x` exponential.
const OCTAVE_THRESHOLDS: [f64; 12] = [
    900.0, 2100.0, 3300.0, 4500.0, 5700.0, 6900.0, 8100.0, 9300.0, 10500.0, 11700.0, 12900.0,
    14100.0,
];

/// Convert a MIDI key (possibly fractional, via cents fine-tuning) to a
/// frequency in Hz, via the SF2 "key to Hz" lookup-table walk.
///
/// Negative keys return 1.0 Hz (treated as inaudible/guard value by callers).
pub fn key_to_hz(key: f64) -> f64 {
    if key < 0.0 {
        return 1.0;
    }

    let mut ratio = 1.0;
    let mut offset = 300.0;
    for &threshold in OCTAVE_THRESHOLDS.iter() {
        if key * 100.0 < threshold {
            break;
        }
        offset -= 1200.0;
        ratio *= 2.0;
    }

    let table = &tables().cent_to_hz;
    let index = ((key * 100.0).round() as i64 + offset as i64).rem_euclid(CENT_TABLE_LEN as i64);
    ratio * table[index as usize]
}

/// Convert a timecent duration parameter to seconds: `2^(tc/1200)`.
pub fn timecent_to_second(timecents: f64) -> f64 {
    2f64.powf(timecents / 1200.0)
}

/// Convert an absolute-cent pitch parameter to Hz: `8.176 * 2^(ac/1200)`.
pub fn absolute_cent_to_hz(absolute_cents: f64) -> f64 {
    8.176 * 2f64.powf(absolute_cents / 1200.0)
}

/// Join a 7-bit MIDI MSB/LSB pair into a 14-bit value.
pub fn join_7bit(msb: u8, lsb: u8) -> u16 {
    ((msb as u16) << 7) | (lsb as u16)
}
