//! Render a short note sequence from a SoundFont to a WAV file.
//!
//! Usage: `cargo run --example render_to_wav -- path/to/font.sf2 output.wav`

use anyhow::{Context, Result};
use hound::{WavSpec, WavWriter};
use sf2synth::SynthesizerSettings;

const SAMPLE_RATE: f64 = 44100.0;

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let font_path = args.next().context("usage: render_to_wav <font.sf2> <output.wav>")?;
    let out_path = args.next().unwrap_or_else(|| "output.wav".to_string());

    let synth = SynthesizerSettings::new(SAMPLE_RATE).build();
    synth.load_sound_font(&font_path)?;

    let spec = WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE as u32,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = WavWriter::create(&out_path, spec)?;

    // A one-octave ascending scale on channel 0, a quarter second per note.
    let notes_per_second = 4;
    let frames_per_note = SAMPLE_RATE as usize / notes_per_second;
    for (i, key) in (60..72).enumerate() {
        if i > 0 {
            synth.process_short_message(u32::from_le_bytes([0x80, 59 + i as u8, 0, 0]));
        }
        synth.process_short_message(u32::from_le_bytes([0x90, key, 100, 0]));
        for _ in 0..frames_per_note {
            let (l, r) = synth.render();
            writer.write_sample((l.clamp(-1.0, 1.0) * i16::MAX as f64) as i16)?;
            writer.write_sample((r.clamp(-1.0, 1.0) * i16::MAX as f64) as i16)?;
        }
    }
    writer.finalize()?;

    println!("Rendered: {}", out_path);
    Ok(())
}
