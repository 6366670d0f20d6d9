//! Microphone capture using cpal
//!
//! Records a fixed-length mono clip from the default input device at
//! 44100 Hz, persists it under `recordings/` as a canonical WAVE file, and
//! hands the normalized samples to the matcher. Blocking by design; callers
//! on the async runtime should wrap this in `spawn_blocking`.

use crate::error::{Error, Result};
use crate::wav;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

/// Length of a capture clip in seconds
pub const RECORD_SECONDS: u64 = 20;
/// Capture sample rate in Hz
pub const CAPTURE_SAMPLE_RATE: u32 = 44100;
/// Directory recordings are saved to
pub const RECORDINGS_DIR: &str = "recordings";

fn log_stream_error(err: cpal::StreamError) {
    error!("audio input stream error: {}", err);
}

/// Record a clip from the default microphone.
///
/// Returns the normalized samples and their sample rate. The raw capture is
/// also written to `output_dir` so a problematic clip can be replayed later.
pub fn record_clip(output_dir: &Path) -> Result<(Vec<f64>, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Capture("no default input device".to_string()))?;

    let supported = device
        .default_input_config()
        .map_err(|e| Error::Capture(format!("no default input config: {}", e)))?;

    let config = StreamConfig {
        channels: 1,
        sample_rate: SampleRate(CAPTURE_SAMPLE_RATE),
        buffer_size: BufferSize::Default,
    };

    let (tx, rx) = std::sync::mpsc::channel::<Vec<i16>>();

    // The callback runs on the audio thread; chunks are copied out
    // immediately and drained after the stream stops.
    let stream = match supported.sample_format() {
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let _ = tx.send(data.to_vec());
            },
            log_stream_error,
            None,
        ),
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let converted = data
                    .iter()
                    .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                    .collect();
                let _ = tx.send(converted);
            },
            log_stream_error,
            None,
        ),
        other => {
            return Err(Error::Capture(format!(
                "unsupported input sample format: {:?}",
                other
            )))
        }
    }
    .map_err(|e| Error::Capture(format!("failed to build input stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| Error::Capture(format!("failed to start input stream: {}", e)))?;

    info!("recording for {} seconds...", RECORD_SECONDS);
    std::thread::sleep(Duration::from_secs(RECORD_SECONDS));
    drop(stream);

    let mut pcm: Vec<i16> = Vec::with_capacity(CAPTURE_SAMPLE_RATE as usize * RECORD_SECONDS as usize);
    for chunk in rx.try_iter() {
        pcm.extend_from_slice(&chunk);
    }

    if pcm.is_empty() {
        return Err(Error::Capture("no audio captured".to_string()));
    }

    let mut bytes = Vec::with_capacity(pcm.len() * 2);
    for sample in &pcm {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }

    std::fs::create_dir_all(output_dir)?;
    let file_name = format!(
        "rec_{}_{}.wav",
        chrono::Utc::now().timestamp(),
        rand::random::<u16>()
    );
    let path = output_dir.join(file_name);
    wav::write_wav(&path, &bytes, CAPTURE_SAMPLE_RATE, 1)?;
    info!(path = %path.display(), "recording saved");

    let samples = pcm.iter().map(|&s| s as f64 / 32768.0).collect();
    Ok((samples, CAPTURE_SAMPLE_RATE))
}
