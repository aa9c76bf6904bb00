//! Per-voice rendering benchmarks.
//!
//! Measures the cost of the per-frame `update`/`render` pair and of a
//! fully loaded 64-voice channel, the two hot paths the render thread
//! walks every block.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sf2synth::channel::{Channel, PresetRef};
use sf2synth::soundfont::generator::{GeneratorSet, INSTRUMENT, SAMPLE_ID, SAMPLE_MODES};
use sf2synth::soundfont::modulator_params::ModulatorParameterSet;
use sf2synth::soundfont::{Instrument, Preset, Sample, SoundFont, Zone};
use sf2synth::voice::Voice;
use std::sync::Arc;

const SAMPLE_RATE: f64 = 44100.0;

fn test_sample() -> Sample {
    Sample {
        name: "tone".into(),
        start: 0,
        end: 44100,
        start_loop: 1000,
        end_loop: 40000,
        sample_rate: 44100,
        original_key: 60,
        pitch_correction: 0,
    }
}

fn test_pool() -> Arc<[i16]> {
    vec![i16::MAX / 2; 44100].into()
}

fn looped_voice() -> Voice {
    let mut gens = GeneratorSet::new();
    gens.set(SAMPLE_ID, 0);
    gens.set(SAMPLE_MODES, 1);
    Voice::new(1, SAMPLE_RATE, &test_sample(), test_pool(), gens, ModulatorParameterSet::new(), 60, 100, false)
}

fn bench_single_voice_update_and_render(c: &mut Criterion) {
    let mut voice = looped_voice();
    c.bench_function("voice_update_render", |b| {
        b.iter(|| {
            voice.update(black_box(SAMPLE_RATE));
            black_box(voice.render())
        })
    });
}

fn test_font() -> Arc<SoundFont> {
    let mut izone = Zone::default();
    izone.generators.set(SAMPLE_ID, 0);
    izone.generators.set(SAMPLE_MODES, 1);
    let instrument = Instrument { name: "tone".into(), zones: vec![izone] };
    let mut pzone = Zone::default();
    pzone.generators.set(INSTRUMENT, 0);
    let preset = Preset { name: "tone-preset".into(), bank: 0, program: 0, zones: vec![pzone] };
    Arc::new(SoundFont {
        name: "bench".into(),
        pool: vec![i16::MAX / 2; 44100].into(),
        samples: vec![test_sample()],
        instruments: vec![instrument],
        presets: vec![preset],
    })
}

/// A channel at its default 128-voice reserve, fully populated by 64
/// simultaneous notes, the worst case the render loop sees per channel.
fn bench_channel_full_polyphony(c: &mut Criterion) {
    let channel = Channel::new(0, SAMPLE_RATE, 128, None);
    channel.set_preset(PresetRef { font: test_font(), index: 0 });
    for key in 0..64u8 {
        channel.note_on(36 + key, 100);
    }
    c.bench_function("channel_render_64_voices", |b| {
        b.iter(|| black_box(channel.render()))
    });
}

criterion_group!(voice_benches, bench_single_voice_update_and_render, bench_channel_full_polyphony);
criterion_main!(voice_benches);
