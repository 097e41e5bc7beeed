//! Play an arpeggio through the default output device.
//!
//! Run with: cargo run --example pattern_player --features cpal_sink

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use schall::nodes::{Gain, Sine};
use schall::pattern::{Item, Sequence, Shuffle};
use schall::{CpalDevice, Engine, EngineConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let device = CpalDevice::default_output().ok_or("No audio device")?;
    let config = EngineConfig::default()
        .with_sample_rate(device.sample_rate())
        .with_channels(device.channels() as usize)
        .with_bpm(110.0);
    let mut engine = Engine::new(config)?;
    let mut handle = engine.handle().ok_or("engine handle already taken")?;

    let osc = engine.add(Sine::new(440.0));
    let level = engine.add(Gain::new(0.5));
    engine.connect(&osc, &level)?;
    engine.output(&level)?;

    // Shuffled chord tones, then a rising run, forever.
    let chord = Shuffle::from_values([261.63, 329.63, 392.0, 523.25], 2);
    let run = Sequence::from_values([293.66, 349.23, 440.0, 587.33], 1);
    let melody = Sequence::looping(vec![Item::pattern(chord), Item::pattern(run)]);

    engine
        .scheduler_mut()
        .play(vec![Item::pattern(melody)], 0.25, move |graph, _, values| {
            if let Some(osc) = graph.processor_mut::<Sine>(osc) {
                osc.set_frequency(values[0] as f32);
            }
        });

    let sample_rate = engine.sample_rate() as f64;
    let played = engine.device().playback_counter();
    let _stream = device.start(engine, Arc::clone(&played))?;

    println!("Playing on {}... Ctrl+C to stop", device.name());
    let mut second = 0_u64;
    loop {
        sleep(Duration::from_secs(1));
        second += 1;
        let frames = played.load(Ordering::Relaxed);
        println!("{:.1}s played ({frames} frames)", frames as f64 / sample_rate);

        // Swell and fade the level every few seconds.
        let gain = if second % 4 < 2 { 0.5 } else { 0.2 };
        let sent = handle.send(move |graph, _| {
            if let Some(level) = graph.processor_mut::<Gain>(level) {
                level.set_gain(gain);
            }
        });
        if sent.is_err() {
            eprintln!("command queue full, skipping level change");
        }
    }
}
