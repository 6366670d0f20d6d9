//! Audio acquisition and transcoding
//!
//! Source audio is fetched with the external `yt-dlp` downloader and
//! normalized with the external `ffmpeg` transcoder into the single-channel
//! 16-bit 44100 Hz WAVE the engine expects.

use crate::error::{Error, Result};
use crate::spotify::Track;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Directory downloaded source audio lands in
pub const SONGS_DIR: &str = "songs";

/// Sample rate the transcoder normalizes to
const TRANSCODE_SAMPLE_RATE: &str = "44100";

/// Download the best audio for a track, searching by artist and title.
///
/// The file is named "Title - Artist.m4a" after sanitisation and an
/// existing download is reused.
pub async fn download_track(track: &Track, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let file_name = format!(
        "{} - {}",
        sanitize_component(&track.title),
        sanitize_component(&track.artist)
    );
    let output = dir.join(format!("{}.m4a", file_name));

    if output.exists() {
        debug!(path = %output.display(), "source audio already downloaded");
        return Ok(output);
    }

    let query = format!("ytsearch1:{} {}", track.artist, track.title);
    info!(title = %track.title, artist = %track.artist, "downloading source audio");

    let result = Command::new("yt-dlp")
        .args(["--extract-audio", "--audio-format", "m4a", "--output"])
        .arg(&output)
        .arg(&query)
        .output()
        .await
        .map_err(|e| Error::Fetch(format!("failed to run yt-dlp: {}", e)))?;

    if !result.status.success() {
        return Err(Error::Fetch(format!(
            "yt-dlp exited with {}: {}",
            result.status,
            String::from_utf8_lossy(&result.stderr)
        )));
    }

    Ok(output)
}

/// Convert an audio file into mono 16-bit PCM WAVE at 44100 Hz.
pub async fn transcode_to_wav(input: &Path) -> Result<PathBuf> {
    let output = input.with_extension("wav");

    let result = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(input)
        .args(["-acodec", "pcm_s16le", "-ar", TRANSCODE_SAMPLE_RATE, "-ac", "1"])
        .arg(&output)
        .output()
        .await
        .map_err(|e| Error::Fetch(format!("failed to run ffmpeg: {}", e)))?;

    if !result.status.success() {
        return Err(Error::Fetch(format!(
            "ffmpeg exited with {}: {}",
            result.status,
            String::from_utf8_lossy(&result.stderr)
        )));
    }

    debug!(path = %output.display(), "transcoded to wav");
    Ok(output)
}

/// Strip characters that are hostile to file paths on any platform.
pub fn sanitize_component(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '\\' | '/' | '|' | '?' | '*'))
        .collect()
}
