//! Candidate assembly and time-coherence scoring
//!
//! A query clip matches a catalog song when many of their shared addresses
//! agree on relative timing: for any two matched pairs the gap between the
//! query anchors should equal the gap between the stored anchors. Counting
//! such coherent pairs approximates the classical offset-histogram peak
//! without materialising the histogram.

use crate::db;
use crate::error::{Error, Result};
use crate::{dsp, fingerprint};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Maximum disagreement between query-side and store-side anchor gaps, in
/// milliseconds. Absorbs quantisation and minor drift.
pub const TOLERANCE_MS: i64 = 100;

/// A ranked catalog candidate
#[derive(Debug, Clone)]
pub struct Match {
    pub song_id: u32,
    pub title: String,
    pub artist: String,
    /// Earliest stored anchor time among the matched couples
    pub earliest_time_ms: u32,
    pub score: f64,
}

/// Run the full query pipeline against a PCM clip and rank the catalog.
pub async fn match_samples(
    pool: &SqlitePool,
    samples: Vec<f64>,
    sample_rate: u32,
    duration: f64,
    cancel: &CancellationToken,
) -> Result<Vec<Match>> {
    tracing::debug!(sample_rate, duration, "fingerprinting query clip");

    let query = tokio::task::spawn_blocking(move || -> Result<HashMap<u32, u32>> {
        let spectrogram = dsp::spectrogram(&samples, sample_rate)?;
        let peaks = fingerprint::extract_peaks(&spectrogram);
        Ok(fingerprint::fingerprints(&peaks, sample_rate, ())
            .into_iter()
            .map(|(address, couple)| (address, couple.anchor_time_ms))
            .collect())
    })
    .await
    .map_err(|e| Error::Internal(format!("query fingerprint task failed: {}", e)))??;

    tracing::debug!(address_count = query.len(), "probing index");

    find_matches(pool, &query, cancel).await
}

/// Rank catalog songs against a query fingerprint map.
///
/// Probes the store once for all query addresses, builds per-song
/// (queryTime, dbTime) pair lists, scores each song by its coherent pair
/// count, and resolves titles. Songs deleted since the probe are dropped.
/// An empty result means no catalog song shares a single address with the
/// query; that is a report, not an error.
pub async fn find_matches(
    pool: &SqlitePool,
    query: &HashMap<u32, u32>,
    cancel: &CancellationToken,
) -> Result<Vec<Match>> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let addresses: Vec<u32> = query.keys().copied().collect();
    let hits = db::fingerprints::lookup_addresses(pool, &addresses).await?;

    let mut pairs: HashMap<u32, Vec<(u32, u32)>> = HashMap::new();
    let mut earliest: HashMap<u32, u32> = HashMap::new();

    for (address, couples) in &hits {
        let Some(&query_time_ms) = query.get(address) else {
            continue;
        };
        for &(db_time_ms, song_id) in couples {
            pairs
                .entry(song_id)
                .or_default()
                .push((query_time_ms, db_time_ms));
            earliest
                .entry(song_id)
                .and_modify(|t| *t = (*t).min(db_time_ms))
                .or_insert(db_time_ms);
        }
    }

    let mut matches = Vec::with_capacity(pairs.len());
    for (song_id, times) in pairs {
        let score = coherent_pairs(&times) as f64;

        let song = match db::songs::get_song(pool, song_id).await {
            Ok(song) => song,
            Err(Error::NotFound(_)) => {
                tracing::debug!(song_id, "candidate song vanished, dropping");
                continue;
            }
            Err(e) => return Err(e),
        };

        matches.push(Match {
            song_id,
            title: song.title,
            artist: song.artist,
            earliest_time_ms: earliest[&song_id],
            score,
        });
    }

    matches.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.song_id.cmp(&b.song_id))
    });

    Ok(matches)
}

/// Count time-coherent pairs among matched (queryTime, dbTime) tuples.
///
/// Quadratic in the per-song pair count, which stays small after filtering
/// to shared addresses.
fn coherent_pairs(times: &[(u32, u32)]) -> u64 {
    let mut count = 0;
    for i in 0..times.len() {
        for j in (i + 1)..times.len() {
            let query_delta = times[i].0 as i64 - times[j].0 as i64;
            let db_delta = times[i].1 as i64 - times[j].1 as i64;
            if (query_delta - db_delta).abs() <= TOLERANCE_MS {
                count += 1;
            }
        }
    }
    count
}
