//! Stream a mono WAV file to the default output device.
//!
//! cargo run --example play --features std -- <file.wav> [speed]

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use monowav::{IoSource, MonoWavPlayer, PlaybackState, SampleFormat};
use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;

/// Convert one buffer of WAV samples to f32 in the range +/-1.0.
fn push_samples(format: SampleFormat, bytes: &[u8], out: &mut VecDeque<f32>) {
    match format {
        SampleFormat::U8 => out.extend(bytes.iter().map(|&b| (b as f32 - 128.0) / 128.0)),
        SampleFormat::I16 => out.extend(
            bytes
                .chunks_exact(2)
                .map(|s| i16::from_le_bytes([s[0], s[1]]) as f32 / 32768.0),
        ),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: play <file.wav> [speed]"))?;
    let speed: f32 = args.next().map(|s| s.parse()).transpose()?.unwrap_or(1.0);

    let file = BufReader::new(File::open(&path)?);
    let mut player = MonoWavPlayer::new(IoSource::new(file))?;
    player.set_speed(speed);
    let specs = player.specs();
    println!("WAV format: {:?}, speed: {}", specs, player.speed().as_f32());

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("no output device"))?;
    println!("Default output device: {:?}", device.name());

    let default_config = device.default_output_config()?;
    let channels = default_config.channels() as usize;
    let config = cpal::StreamConfig {
        channels: default_config.channels(),
        sample_rate: cpal::SampleRate(player.sample_rate()),
        buffer_size: cpal::BufferSize::Default,
    };

    let (done_tx, done_rx) = std::sync::mpsc::channel();
    let mut pending = VecDeque::new();
    let mut finished = false;
    let err_fn = |err| eprintln!("an error occurred on stream: {}", err);
    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            for frame in data.chunks_mut(channels) {
                while pending.is_empty() && !finished {
                    match player.get_buffer() {
                        Ok(result) => {
                            push_samples(specs.sample_format, result.samples(), &mut pending)
                        }
                        Err(e) => {
                            eprintln!("read error: {}", e);
                            finished = true;
                        }
                    }
                    if player.state() == PlaybackState::Done {
                        finished = true;
                    }
                    if finished {
                        let _ = done_tx.send(());
                    }
                }
                let value = pending.pop_front().unwrap_or(0.0);
                for sample in frame.iter_mut() {
                    *sample = value;
                }
            }
        },
        err_fn,
        None,
    )?;
    stream.play()?;

    done_rx.recv()?;
    // Let the last buffer play out
    std::thread::sleep(std::time::Duration::from_millis(200));
    Ok(())
}
