//! Signal-processing pipeline
//!
//! Turns raw PCM into the frame-wise complex spectra the peak picker
//! consumes: low-pass filter, decimate by 4, then a sliding Hamming-windowed
//! FFT with a 32-sample hop.

pub mod fft;
pub mod filter;

use crate::error::Result;
use rustfft::num_complex::Complex64;
use std::f64::consts::PI;

/// Low-pass cutoff applied before decimation, in Hz
pub const CUTOFF_FREQUENCY: f64 = 5000.0;
/// Decimation factor from the input rate to the analysis rate
pub const DOWNSAMPLE_RATIO: u32 = 4;
/// STFT window length in (downsampled) samples
pub const WINDOW_SIZE: usize = 1024;
/// STFT hop in (downsampled) samples
pub const HOP_SIZE: usize = WINDOW_SIZE / 32;

/// Compute the STFT of a PCM buffer.
///
/// Frames start every [`HOP_SIZE`] samples while a full window fits, giving
/// `(L - N)/H + 1` frames for a downsampled signal of length `L >= N`. Each
/// frame is a length-[`WINDOW_SIZE`] complex spectrum. Inputs shorter than
/// one window produce an empty spectrogram.
pub fn spectrogram(samples: &[f64], sample_rate: u32) -> Result<Vec<Vec<Complex64>>> {
    let filtered = filter::low_pass(CUTOFF_FREQUENCY, sample_rate, samples);
    let downsampled =
        filter::downsample(&filtered, sample_rate, sample_rate / DOWNSAMPLE_RATIO)?;

    let window = hamming_window(WINDOW_SIZE);

    let mut frames = Vec::new();
    let mut start = 0;
    while start + WINDOW_SIZE <= downsampled.len() {
        let mut frame: Vec<f64> = downsampled[start..start + WINDOW_SIZE].to_vec();
        for (value, coefficient) in frame.iter_mut().zip(&window) {
            *value *= coefficient;
        }
        frames.push(frame);
        start += HOP_SIZE;
    }

    Ok(fft::fft_frames(frames))
}

/// Start time of an STFT frame in seconds.
///
/// Frames advance by [`HOP_SIZE`] samples of the downsampled signal, so the
/// frame at `frame_index` begins at `frame_index * H / (sample_rate / 4)`.
pub fn frame_time(frame_index: usize, sample_rate: u32) -> f64 {
    frame_index as f64 * HOP_SIZE as f64 / (sample_rate as f64 / DOWNSAMPLE_RATIO as f64)
}

/// Precomputed Hamming window coefficients.
pub fn hamming_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (size as f64 - 1.0)).cos())
        .collect()
}
