//! Forward FFT
//!
//! Thin wrapper around rustfft. The one-shot transform covers standalone
//! use; the batch helper plans once and reuses the plan across every frame
//! of a spectrogram.

use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;

/// Forward DFT of a real-valued input.
///
/// Returns `input.len()` complex bins with twiddle factors `e^(-j*2*pi*k/N)`.
pub fn fft(input: &[f64]) -> Vec<Complex64> {
    let mut buffer: Vec<Complex64> = input.iter().map(|&x| Complex64::new(x, 0.0)).collect();
    if buffer.len() > 1 {
        FftPlanner::new()
            .plan_fft_forward(buffer.len())
            .process(&mut buffer);
    }
    buffer
}

/// Transform a batch of equal-length frames, planning the FFT once.
pub fn fft_frames(frames: Vec<Vec<f64>>) -> Vec<Vec<Complex64>> {
    let Some(len) = frames.first().map(|frame| frame.len()) else {
        return Vec::new();
    };

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(len);

    frames
        .into_iter()
        .map(|frame| {
            let mut buffer: Vec<Complex64> =
                frame.iter().map(|&x| Complex64::new(x, 0.0)).collect();
            fft.process(&mut buffer);
            buffer
        })
        .collect()
}
