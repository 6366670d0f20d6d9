//! End-to-end engine tests
//!
//! Exercises the full ingest and query pipelines against an in-memory
//! catalog using synthetic audio: pure sines for stationary content and a
//! non-repeating tone ladder when the test needs time-localized structure.

use findr::db;
use findr::ingest;
use findr::matching;
use sqlx::SqlitePool;
use std::f64::consts::PI;
use tokio_util::sync::CancellationToken;

const SAMPLE_RATE: u32 = 44100;

async fn test_pool() -> SqlitePool {
    db::init_pool("sqlite::memory:").await.unwrap()
}

fn sine(freq: f64, seconds: f64) -> Vec<f64> {
    let n = (seconds * SAMPLE_RATE as f64) as usize;
    (0..n)
        .map(|i| (2.0 * PI * freq * i as f64 / SAMPLE_RATE as f64).sin() * 0.8)
        .collect()
}

/// A tone that steps up by 20 Hz every 50 ms. No two steps share a
/// frequency, so every stretch of the signal is unique in time.
fn tone_ladder(seconds: f64) -> Vec<f64> {
    let step_len = (0.05 * SAMPLE_RATE as f64) as usize;
    let n = (seconds * SAMPLE_RATE as f64) as usize;
    (0..n)
        .map(|i| {
            let step = i / step_len;
            let freq = 400.0 + 20.0 * step as f64;
            (2.0 * PI * freq * i as f64 / SAMPLE_RATE as f64).sin() * 0.8
        })
        .collect()
}

async fn ingest_samples(pool: &SqlitePool, samples: Vec<f64>, title: &str, artist: &str) -> u32 {
    let duration = samples.len() as f64 / SAMPLE_RATE as f64;
    let cancel = CancellationToken::new();
    ingest::ingest_one(pool, samples, SAMPLE_RATE, duration, title, artist, &cancel)
        .await
        .unwrap()
        .song_id
}

async fn query(pool: &SqlitePool, samples: Vec<f64>) -> Vec<matching::Match> {
    let duration = samples.len() as f64 / SAMPLE_RATE as f64;
    let cancel = CancellationToken::new();
    matching::match_samples(pool, samples, SAMPLE_RATE, duration, &cancel)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_self_match_sine() {
    let pool = test_pool().await;

    let song_id = ingest_samples(&pool, sine(1000.0, 10.0), "Tone", "Synth").await;
    let matches = query(&pool, sine(1000.0, 10.0)).await;

    assert!(!matches.is_empty());
    assert_eq!(matches[0].song_id, song_id);
    assert!(
        matches[0].score > 100.0,
        "self-match score too low: {}",
        matches[0].score
    );
}

#[tokio::test]
async fn test_self_match_starts_at_clip_beginning() {
    let pool = test_pool().await;

    let song_id = ingest_samples(&pool, tone_ladder(10.0), "Ladder", "Synth").await;
    let matches = query(&pool, tone_ladder(10.0)).await;

    assert_eq!(matches[0].song_id, song_id);
    assert!(matches[0].score > 100.0);
    // The earliest matched anchor sits at the start of the track, within
    // the granularity of the analysis window.
    assert!(
        matches[0].earliest_time_ms <= 200,
        "earliest anchor unexpectedly late: {} ms",
        matches[0].earliest_time_ms
    );
}

#[tokio::test]
async fn test_distinct_tracks_rank_correctly() {
    let pool = test_pool().await;

    let low_id = ingest_samples(&pool, sine(1000.0, 10.0), "Low Tone", "Synth").await;
    let high_id = ingest_samples(&pool, sine(2000.0, 10.0), "High Tone", "Synth").await;

    let matches = query(&pool, sine(2000.0, 10.0)).await;

    assert!(!matches.is_empty());
    assert_eq!(matches[0].song_id, high_id);
    if let Some(low) = matches.iter().find(|m| m.song_id == low_id) {
        assert!(low.score < matches[0].score);
    }
}

#[tokio::test]
async fn test_excerpt_reports_offset() {
    let pool = test_pool().await;

    let track = tone_ladder(10.0);
    let song_id = ingest_samples(&pool, track.clone(), "Ladder", "Synth").await;

    // A 5 second excerpt starting 2.0 seconds in.
    let start = 2 * SAMPLE_RATE as usize;
    let end = 7 * SAMPLE_RATE as usize;
    let matches = query(&pool, track[start..end].to_vec()).await;

    assert!(!matches.is_empty());
    assert_eq!(matches[0].song_id, song_id);
    let earliest = matches[0].earliest_time_ms as i64;
    assert!(
        (earliest - 2000).abs() <= 200,
        "excerpt offset reported as {} ms, expected about 2000 ms",
        earliest
    );
}

#[tokio::test]
async fn test_duplicate_ingest_leaves_index_unchanged() {
    let pool = test_pool().await;

    let track = tone_ladder(10.0);
    ingest_samples(&pool, track.clone(), "Ladder", "Synth").await;
    let triples = db::fingerprints::total_fingerprints(&pool).await.unwrap();

    let cancel = CancellationToken::new();
    let err = ingest::ingest_one(
        &pool,
        track,
        SAMPLE_RATE,
        10.0,
        "Ladder",
        "Synth",
        &cancel,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, findr::Error::DuplicateKey(_)));
    assert_eq!(
        db::fingerprints::total_fingerprints(&pool).await.unwrap(),
        triples
    );
    assert_eq!(db::songs::total_songs(&pool).await.unwrap(), 1);
}

#[tokio::test]
async fn test_empty_catalog_reports_no_matches() {
    let pool = test_pool().await;

    let matches = query(&pool, sine(1000.0, 10.0)).await;
    assert!(matches.is_empty());
}

#[tokio::test]
async fn test_deleted_song_no_longer_matches() {
    let pool = test_pool().await;

    let track = tone_ladder(10.0);
    let song_id = ingest_samples(&pool, track.clone(), "Ladder", "Synth").await;
    db::songs::delete_song(&pool, song_id).await.unwrap();

    let start = 2 * SAMPLE_RATE as usize;
    let end = 7 * SAMPLE_RATE as usize;
    let matches = query(&pool, track[start..end].to_vec()).await;

    assert!(matches.is_empty());
}
