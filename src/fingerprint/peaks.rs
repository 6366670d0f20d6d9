//! Spectral peak extraction
//!
//! Keeps one peak per logarithmic band per frame. Restricting each frame to
//! at most six per-band maxima suppresses broadband noise while preserving
//! the salient content of every register.

use rustfft::num_complex::Complex64;

/// Logarithmic band boundaries over the lower half of the spectrum,
/// as half-open bin ranges.
pub const BANDS: [(usize, usize); 6] = [(0, 10), (10, 20), (20, 40), (40, 80), (80, 160), (160, 512)];

/// A spectral peak: the strongest bin of one band in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peak {
    pub frame_index: usize,
    pub freq_bin: usize,
}

/// Extract per-band maxima from a spectrogram.
///
/// A band contributes a peak only when its maximum magnitude is strictly
/// positive; ties break to the lowest bin index. Peaks come out in frame
/// order, which downstream pairing relies on.
pub fn extract_peaks(spectrogram: &[Vec<Complex64>]) -> Vec<Peak> {
    let mut peaks = Vec::new();

    for (frame_index, frame) in spectrogram.iter().enumerate() {
        for &(lo, hi) in &BANDS {
            if frame.len() < hi {
                continue;
            }

            let mut max_magnitude = 0.0;
            let mut max_bin = lo;
            for (offset, value) in frame[lo..hi].iter().enumerate() {
                let magnitude = value.norm();
                if magnitude > max_magnitude {
                    max_magnitude = magnitude;
                    max_bin = lo + offset;
                }
            }

            if max_magnitude > 0.0 {
                peaks.push(Peak {
                    frame_index,
                    freq_bin: max_bin,
                });
            }
        }
    }

    peaks
}
