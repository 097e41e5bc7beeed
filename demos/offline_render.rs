//! Render a short pattern-driven melody to a WAV file, no audio device needed.
//!
//! Run with: cargo run --example offline_render -- out.wav

use hound::{SampleFormat, WavSpec, WavWriter};

use schall::nodes::{Delay, Gain, Sine};
use schall::pattern::{Choose, Item, Sequence};
use schall::{Engine, EngineConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "schall.wav".into());
    let config = EngineConfig::default().with_channels(2).with_bpm(140.0);
    let sample_rate = config.sample_rate;
    let mut engine = Engine::new(config)?;

    // sine -> level -> out, plus a feedback echo off the level
    let osc = engine.add(Sine::new(220.0));
    let level = engine.add(Gain::new(0.0));
    let echo = engine.add(Delay::new(1.0, 0.32));
    let decay = engine.add(Gain::new(0.4));
    engine.connect(&osc, &level)?;
    engine.connect(&level, &echo)?;
    engine.connect(&echo, &decay)?;
    engine.connect(&decay, &echo)?;
    engine.output(&level)?;
    engine.output(&echo)?;

    let notes = Sequence::from_values([220.0, 277.18, 329.63, 440.0, 329.63, 277.18], 4);
    let accents = Choose::from_values([0.3, 0.6, 0.9], 24).with_seed(3);
    let durations = Sequence::from_values([0.5, 0.5, 1.0], 8);

    engine.scheduler_mut().play(
        vec![Item::pattern(notes), Item::pattern(accents)],
        Item::pattern(durations),
        move |graph, _, values| {
            if let Some(osc) = graph.processor_mut::<Sine>(osc) {
                osc.set_frequency(values[0] as f32);
            }
            if let Some(level) = graph.processor_mut::<Gain>(level) {
                level.set_gain(values[1] as f32);
            }
        },
    );

    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(&path, spec)?;
    let block_size = engine.config().block_size;
    let total = sample_rate as usize * 12;

    let mut written = 0;
    while written < total {
        let frames = block_size.min(total - written);
        for sample in engine.render(frames) {
            writer.write_sample(sample)?;
        }
        written += frames;
    }
    writer.finalize()?;

    println!("wrote {written} frames to {path}");
    Ok(())
}
