//! Track ingest
//!
//! `ingest_one` drives the sequential pipeline for a single track; batch
//! ingest fans out over it with a worker pool bounded by the CPU count.
//! Registration and fingerprint insertion share one transaction, so a
//! failure or cancellation at any stage leaves the catalog untouched.

use crate::db;
use crate::error::{Error, Result};
use crate::spotify::Track;
use crate::{dsp, fetch, fingerprint, wav};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Result of a successful single-track ingest
#[derive(Debug, Clone, Copy)]
pub struct IngestOutcome {
    pub song_id: u32,
    pub fingerprint_count: usize,
}

/// Fingerprint one track and commit it to the catalog.
///
/// The pipeline runs spectrogram, peak extraction and fingerprinting on the
/// blocking thread pool, checking the cancellation token between stages. A
/// stage that produces no data fails the track with `PipelineStageFailed`;
/// nothing has been written at that point.
pub async fn ingest_one(
    pool: &SqlitePool,
    samples: Vec<f64>,
    sample_rate: u32,
    duration: f64,
    title: &str,
    artist: &str,
    cancel: &CancellationToken,
) -> Result<IngestOutcome> {
    tracing::debug!(sample_rate, duration, title, artist, "ingesting track");

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let spectrogram =
        tokio::task::spawn_blocking(move || dsp::spectrogram(&samples, sample_rate))
            .await
            .map_err(|e| Error::Internal(format!("spectrogram task failed: {}", e)))??;
    if spectrogram.is_empty() {
        return Err(Error::PipelineStageFailed("spectrogram"));
    }

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let couples = tokio::task::spawn_blocking(move || {
        let peaks = fingerprint::extract_peaks(&spectrogram);
        fingerprint::fingerprints(&peaks, sample_rate, ())
    })
    .await
    .map_err(|e| Error::Internal(format!("fingerprint task failed: {}", e)))?;
    if couples.is_empty() {
        return Err(Error::PipelineStageFailed("fingerprint"));
    }

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let song_id = db::register_song_with_fingerprints(pool, title, artist, &couples).await?;

    info!(
        song_id,
        title,
        artist,
        fingerprint_count = couples.len(),
        "track ingested"
    );

    Ok(IngestOutcome {
        song_id,
        fingerprint_count: couples.len(),
    })
}

/// Ingest a batch of tracks concurrently.
///
/// Workers acquire a semaphore permit sized to the CPU count, so at most
/// that many tracks are fetched and fingerprinted at once. Per-track
/// failures are logged and never abort the batch. Returns the number of
/// tracks actually ingested.
pub async fn ingest_tracks(
    pool: SqlitePool,
    tracks: Vec<Track>,
    cancel: CancellationToken,
) -> usize {
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let semaphore = Arc::new(Semaphore::new(workers));

    info!(track_count = tracks.len(), workers, "starting batch ingest");

    let mut set = JoinSet::new();
    for track in tracks {
        let pool = pool.clone();
        let cancel = cancel.clone();
        let semaphore = Arc::clone(&semaphore);

        set.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return false;
            };

            match ingest_track(&pool, &track, &cancel).await {
                Ok(true) => true,
                Ok(false) => false,
                Err(Error::DuplicateKey(_)) => {
                    info!(
                        title = %track.title,
                        artist = %track.artist,
                        "song already in the catalog, skipping"
                    );
                    false
                }
                Err(Error::Cancelled) => {
                    info!(title = %track.title, "ingest cancelled");
                    false
                }
                Err(e) => {
                    warn!(
                        title = %track.title,
                        artist = %track.artist,
                        error = %e,
                        "track ingest failed"
                    );
                    false
                }
            }
        });
    }

    let mut ingested = 0;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(true) => ingested += 1,
            Ok(false) => {}
            Err(e) => warn!("ingest worker panicked: {}", e),
        }
    }

    info!(ingested, "finished batch ingest");
    ingested
}

/// Fetch, transcode and ingest one track. Returns false when the track was
/// already present.
async fn ingest_track(pool: &SqlitePool, track: &Track, cancel: &CancellationToken) -> Result<bool> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    // Idempotent ingest: a song whose key is already registered is skipped
    // before any download happens.
    let key = db::songs::song_key(&track.title, &track.artist);
    match db::songs::get_song_by_key(pool, &key).await {
        Ok(_) => {
            info!(
                title = %track.title,
                artist = %track.artist,
                "song already in the catalog, skipping"
            );
            return Ok(false);
        }
        Err(Error::NotFound(_)) => {}
        Err(e) => return Err(e),
    }

    let audio_path = fetch::download_track(track, Path::new(fetch::SONGS_DIR)).await?;

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let wav_path = fetch::transcode_to_wav(&audio_path).await?;
    let info = wav::read_wav(&wav_path)?;
    let samples = wav::samples(&info.data)?;

    ingest_one(
        pool,
        samples,
        info.sample_rate,
        info.duration,
        &track.title,
        &track.artist,
        cancel,
    )
    .await?;

    Ok(true)
}
