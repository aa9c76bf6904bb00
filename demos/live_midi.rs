//! Play a SoundFont live from a connected MIDI keyboard.
//!
//! Usage: `cargo run --example live_midi -- path/to/font.sf2`
//!
//! Opens the first available MIDI input port, feeds incoming short messages
//! to a [`Synthesizer`], and streams its render loop to the default audio
//! output device via `cpal`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use midir::{Ignore, MidiInput};
use sf2synth::render::{RenderLoop, RingBuffer};
use sf2synth::{Synthesizer, SynthesizerSettings};

const SAMPLE_RATE: f64 = 44100.0;
const BLOCK_SIZE: usize = 64;
const RING_CAPACITY: usize = 8192;

fn main() -> Result<()> {
    let font_path = std::env::args().nth(1).context("usage: live_midi <font.sf2>")?;

    let synth = Arc::new(SynthesizerSettings::new(SAMPLE_RATE).build());
    synth.load_sound_font(&font_path)?;

    let ring = Arc::new(RingBuffer::<(f32, f32)>::new(RING_CAPACITY));
    let running = Arc::new(AtomicBool::new(true));

    let render_synth = synth.clone();
    let render_ring = ring.clone();
    let render_running = running.clone();
    let render_thread = thread::spawn(move || {
        let mut render_loop = RenderLoop::new(render_synth, render_ring, SAMPLE_RATE, BLOCK_SIZE);
        while render_running.load(Ordering::Relaxed) {
            render_loop.run_blocks(1);
        }
    });

    let _midi_connection = open_midi_input(synth.clone())?;
    let _stream = open_audio_output(ring)?;

    println!("Listening for MIDI input on channel 0-15. Press Ctrl+C to stop.");
    ctrlc_wait();

    running.store(false, Ordering::Relaxed);
    render_thread.join().expect("render thread panicked");
    Ok(())
}

fn open_midi_input(synth: Arc<Synthesizer>) -> Result<midir::MidiInputConnection<()>> {
    let mut input = MidiInput::new("sf2synth live demo")?;
    input.ignore(Ignore::None);
    let ports = input.ports();
    let port = ports.first().context("no MIDI input devices found")?;
    let name = input.port_name(port)?;
    println!("Using MIDI input: {}", name);

    let connection = input
        .connect(
            port,
            "sf2synth-input",
            move |_stamp, message, _| {
                if message.len() >= 3 {
                    let packed = u32::from_le_bytes([message[0], message[1], message[2], 0]);
                    synth.process_short_message(packed);
                } else if message.first() == Some(&0xF0) {
                    synth.process_sys_ex(message);
                }
            },
            (),
        )
        .map_err(|e| anyhow::anyhow!("failed to connect MIDI input: {}", e))?;
    Ok(connection)
}

fn open_audio_output(ring: Arc<RingBuffer<(f32, f32)>>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host.default_output_device().context("no audio output device found")?;
    let config = device.default_output_config()?;

    let stream = device.build_output_stream(
        &config.into(),
        move |data: &mut [f32], _| {
            for frame in data.chunks_mut(2) {
                let (l, r) = ring.pop().unwrap_or((0.0, 0.0));
                frame[0] = l;
                if frame.len() > 1 {
                    frame[1] = r;
                }
            }
        },
        |err| eprintln!("audio stream error: {}", err),
        None,
    )?;
    stream.play()?;
    Ok(stream)
}

fn ctrlc_wait() {
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    let _ = ctrlc_handler(flag);
    while running.load(Ordering::Relaxed) {
        thread::sleep(std::time::Duration::from_millis(200));
    }
}

/// Best-effort Ctrl+C handling without adding a dedicated signal-handling
/// dependency: block on stdin instead, exiting on the first line of input.
fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<()> {
    thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        running.store(false, Ordering::Relaxed);
    });
    Ok(())
}
