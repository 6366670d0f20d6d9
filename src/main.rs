//! findr command-line front-end
//!
//! Two subcommands: `add` ingests a Spotify track/playlist URL or a local
//! audio file into the catalog, `findr` records a clip from the microphone
//! and prints the ranked matches.

use clap::{Parser, Subcommand};
use findr::config::Config;
use findr::spotify::SpotifyClient;
use findr::{capture, db, fetch, ingest, matching, wav};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Identify songs from short audio clips, Shazam style
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a Spotify track/playlist URL or a local audio file
    Add {
        /// Spotify URL or path to an audio file named "Title - Artist.ext"
        source: String,
    },
    /// Record a clip from the microphone and identify it
    Findr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("findr={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let pool = db::init_pool(&config.database_url).await?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling in-flight work");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Add { source } => run_add(&pool, &config, &source, cancel).await,
        Command::Findr => run_findr(&pool, cancel).await,
    }
}

async fn run_add(
    pool: &SqlitePool,
    config: &Config,
    source: &str,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    if source.contains("open.spotify.com") {
        let client = SpotifyClient::new(config.require_spotify()?);

        let tracks = if source.contains("/track/") {
            vec![client.track_from_url(source).await?]
        } else if source.contains("/playlist/") {
            client.playlist_from_url(source).await?
        } else {
            anyhow::bail!("unsupported Spotify URL, expected a track or playlist link");
        };

        let requested = tracks.len();
        let ingested = ingest::ingest_tracks(pool.clone(), tracks, cancel).await;
        println!("Ingested {} of {} track(s)", ingested, requested);
        if ingested == 0 {
            anyhow::bail!("no tracks were ingested");
        }
    } else {
        let path = PathBuf::from(source);
        if !path.exists() {
            anyhow::bail!("no such file: {}", path.display());
        }

        let (title, artist) = title_artist_from_path(&path)?;

        // Files already in WAVE form are parsed directly; everything else
        // goes through the external transcoder first.
        let wav_path = if path.extension().and_then(|e| e.to_str()) == Some("wav") {
            path
        } else {
            fetch::transcode_to_wav(&path).await?
        };

        let wav_info = wav::read_wav(&wav_path)?;
        let samples = wav::samples(&wav_info.data)?;

        let outcome = ingest::ingest_one(
            pool,
            samples,
            wav_info.sample_rate,
            wav_info.duration,
            &title,
            &artist,
            &cancel,
        )
        .await?;

        println!(
            "Ingested \"{}\" by {} (song id {}, {} fingerprints)",
            title, artist, outcome.song_id, outcome.fingerprint_count
        );
    }

    Ok(())
}

async fn run_findr(pool: &SqlitePool, cancel: CancellationToken) -> anyhow::Result<()> {
    let (samples, sample_rate) =
        tokio::task::spawn_blocking(|| capture::record_clip(Path::new(capture::RECORDINGS_DIR)))
            .await??;
    let duration = samples.len() as f64 / sample_rate as f64;
    info!(duration, "captured clip, searching catalog");

    let start = Instant::now();
    let matches = matching::match_samples(pool, samples, sample_rate, duration, &cancel).await?;
    let elapsed = start.elapsed();

    if matches.is_empty() {
        println!("No matches found.");
        println!("\nSearch took: {:.2?}", elapsed);
        return Ok(());
    }

    println!("Top matches ->");
    for m in matches.iter().take(10) {
        println!("\t- {} by {}, score: {:.2}", m.title, m.artist, m.score);
    }

    println!("\nSearch took: {:.2?}", elapsed);

    let best = &matches[0];
    println!(
        "\nFinal prediction: {} by {}, score: {:.2}",
        best.title, best.artist, best.score
    );

    Ok(())
}

/// Derive (title, artist) from a file named "Title - Artist.ext".
fn title_artist_from_path(path: &Path) -> anyhow::Result<(String, String)> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow::anyhow!("file has no usable name: {}", path.display()))?;

    let (title, artist) = stem.split_once(" - ").ok_or_else(|| {
        anyhow::anyhow!(
            "cannot derive title/artist from \"{}\", expected \"Title - Artist.ext\"",
            stem
        )
    })?;

    Ok((title.trim().to_string(), artist.trim().to_string()))
}
