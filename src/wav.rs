//! Canonical WAVE parsing and encoding
//!
//! The engine only accepts the canonical 44-byte header layout: "RIFF" and
//! "WAVE" chunk tags, a 16-byte "fmt " chunk declaring integer PCM, and a
//! single "data" chunk. Anything else is rejected as invalid audio; the
//! external transcoder is expected to normalize exotic files first.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Length of the canonical header in bytes
pub const HEADER_LEN: usize = 44;

/// Parsed WAVE file: format fields plus the raw PCM payload.
#[derive(Debug, Clone)]
pub struct WavInfo {
    pub channels: u16,
    pub sample_rate: u32,
    /// Length of the payload in seconds, derived from the 16-bit sample size
    pub duration: f64,
    pub data: Vec<u8>,
}

/// Read and parse a WAVE file from disk.
pub fn read_wav(path: &Path) -> Result<WavInfo> {
    let bytes = std::fs::read(path)?;
    parse_wav(bytes)
}

/// Parse a canonical WAVE byte buffer.
pub fn parse_wav(mut bytes: Vec<u8>) -> Result<WavInfo> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::InvalidAudio(format!(
            "file is {} bytes, smaller than the {}-byte WAVE header",
            bytes.len(),
            HEADER_LEN
        )));
    }

    if &bytes[0..4] != b"RIFF"
        || &bytes[8..12] != b"WAVE"
        || &bytes[12..16] != b"fmt "
        || &bytes[36..40] != b"data"
    {
        return Err(Error::InvalidAudio("malformed WAVE header".to_string()));
    }

    let audio_format = u16::from_le_bytes([bytes[20], bytes[21]]);
    if audio_format != 1 {
        return Err(Error::InvalidAudio(format!(
            "expected PCM audio format 1, got {}",
            audio_format
        )));
    }

    let bits_per_sample = u16::from_le_bytes([bytes[34], bytes[35]]);
    if bits_per_sample != 16 {
        return Err(Error::InvalidAudio(format!(
            "expected 16 bits per sample, got {}",
            bits_per_sample
        )));
    }

    let channels = u16::from_le_bytes([bytes[22], bytes[23]]);
    let sample_rate = u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]);
    if channels == 0 || sample_rate == 0 {
        return Err(Error::InvalidAudio(
            "zero channel count or sample rate".to_string(),
        ));
    }

    let data = bytes.split_off(HEADER_LEN);
    let duration = data.len() as f64 / (channels as f64 * 2.0 * sample_rate as f64);

    Ok(WavInfo {
        channels,
        sample_rate,
        duration,
        data,
    })
}

/// Decode a raw 16-bit little-endian PCM payload into normalized samples.
///
/// Each byte pair becomes an i16 scaled by 1/32768 into [-1, 1].
pub fn samples(data: &[u8]) -> Result<Vec<f64>> {
    if data.len() % 2 != 0 {
        return Err(Error::InvalidAudio(format!(
            "audio data has an odd number of bytes ({})",
            data.len()
        )));
    }

    Ok(data
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f64 / 32768.0)
        .collect())
}

/// Encode normalized samples back into 16-bit little-endian PCM bytes.
///
/// Inverse of [`samples`]: a decoded int16 buffer re-encodes to the exact
/// original bytes.
pub fn encode_samples(samples: &[f64]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        data.extend_from_slice(&((sample * 32768.0) as i16).to_le_bytes());
    }
    data
}

/// Build the canonical 44-byte header for a PCM payload.
pub fn wav_header(data_len: u32, sample_rate: u32, channels: u16) -> [u8; HEADER_LEN] {
    let byte_rate = sample_rate * channels as u32 * 2;
    let block_align = channels * 2;

    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36 + data_len).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&16u16.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());
    header
}

/// Write a canonical WAVE file.
pub fn write_wav(path: &Path, data: &[u8], sample_rate: u32, channels: u16) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(&wav_header(data.len() as u32, sample_rate, channels))?;
    file.write_all(data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm_bytes(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_pcm_round_trip() {
        // Deterministic pseudo-random int16 buffer.
        let mut state: u32 = 0x1234_5678;
        let values: Vec<i16> = (0..4096)
            .map(|_| {
                state = state.wrapping_mul(1664525).wrapping_add(1013904223);
                (state >> 16) as i16
            })
            .collect();
        let bytes = pcm_bytes(&values);

        let decoded = samples(&bytes).unwrap();
        assert_eq!(decoded.len(), values.len());
        let encoded = encode_samples(&decoded);
        assert_eq!(encoded, bytes);
    }

    #[test]
    fn test_samples_rejects_odd_length() {
        assert!(matches!(samples(&[0, 1, 2]), Err(Error::InvalidAudio(_))));
    }

    #[test]
    fn test_header_round_trip() {
        let data = pcm_bytes(&[0, 100, -100, i16::MAX, i16::MIN]);
        let mut file = wav_header(data.len() as u32, 44100, 1).to_vec();
        file.extend_from_slice(&data);

        let info = parse_wav(file).unwrap();
        assert_eq!(info.channels, 1);
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.data, data);
        assert!((info.duration - data.len() as f64 / (2.0 * 44100.0)).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_short_buffer() {
        assert!(matches!(
            parse_wav(vec![0u8; 10]),
            Err(Error::InvalidAudio(_))
        ));
    }

    #[test]
    fn test_rejects_wrong_chunk_tags() {
        let mut file = wav_header(4, 44100, 1).to_vec();
        file.extend_from_slice(&[0u8; 4]);
        file[0..4].copy_from_slice(b"RIFX");
        assert!(matches!(parse_wav(file), Err(Error::InvalidAudio(_))));
    }

    #[test]
    fn test_rejects_non_pcm_format() {
        let mut file = wav_header(4, 44100, 1).to_vec();
        file.extend_from_slice(&[0u8; 4]);
        // AudioFormat = 3 (IEEE float)
        file[20..22].copy_from_slice(&3u16.to_le_bytes());
        assert!(matches!(parse_wav(file), Err(Error::InvalidAudio(_))));
    }

    #[test]
    fn test_rejects_wrong_bit_depth() {
        let mut file = wav_header(4, 44100, 1).to_vec();
        file.extend_from_slice(&[0u8; 4]);
        file[34..36].copy_from_slice(&24u16.to_le_bytes());
        assert!(matches!(parse_wav(file), Err(Error::InvalidAudio(_))));
    }

    #[test]
    fn test_write_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let data = pcm_bytes(&[1000, -1000, 2000, -2000]);

        write_wav(&path, &data, 44100, 1).unwrap();
        let info = read_wav(&path).unwrap();
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.data, data);
    }
}
