//! SQLite-backed fingerprint index
//!
//! Two tables make up the catalog: `songs` holds one row per registered
//! track, `fingerprints` is the inverted index keyed by the 32-bit address.
//! Foreign keys are enabled on every pooled connection so deleting a song
//! cascades to its index entries.

pub mod fingerprints;
pub mod songs;

use crate::error::Result;
use crate::fingerprint::Couple;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::str::FromStr;

/// Open (creating if necessary) the catalog database and bootstrap its
/// schema.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the songs and fingerprints tables plus the address probe index.
async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS songs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            artist TEXT NOT NULL,
            key TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fingerprints (
            address INTEGER NOT NULL,
            anchor_time_ms INTEGER NOT NULL,
            song_id INTEGER NOT NULL,
            PRIMARY KEY (address, anchor_time_ms, song_id),
            FOREIGN KEY (song_id) REFERENCES songs(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_fingerprints_address ON fingerprints (address)")
        .execute(pool)
        .await?;

    tracing::debug!("database tables initialized (songs, fingerprints)");

    Ok(())
}

/// Register a song and persist its fingerprints in one transaction.
///
/// Either the song row and every index triple become durable together, or
/// nothing does. A duplicate song key aborts the transaction with
/// `DuplicateKey` before any fingerprint is written, so a failed ingest can
/// never leave an orphan row behind.
pub async fn register_song_with_fingerprints(
    pool: &SqlitePool,
    title: &str,
    artist: &str,
    fingerprints: &HashMap<u32, Couple>,
) -> Result<u32> {
    let key = songs::song_key(title, artist);

    let mut tx = pool.begin().await?;

    let song_id: i64 =
        sqlx::query_scalar("INSERT INTO songs (title, artist, key) VALUES (?, ?, ?) RETURNING id")
            .bind(title)
            .bind(artist)
            .bind(&key)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| songs::map_unique_violation(e, &key))?;

    let triples: Vec<(u32, u32, u32)> = fingerprints
        .iter()
        .map(|(address, couple)| (*address, couple.anchor_time_ms, song_id as u32))
        .collect();
    fingerprints::insert_triples(&mut tx, &triples).await?;

    tx.commit().await?;

    Ok(song_id as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    async fn test_pool() -> SqlitePool {
        init_pool("sqlite::memory:").await.unwrap()
    }

    fn couples(entries: &[(u32, u32)]) -> HashMap<u32, Couple> {
        entries
            .iter()
            .map(|&(address, anchor_time_ms)| {
                (
                    address,
                    Couple {
                        anchor_time_ms,
                        tag: (),
                    },
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_atomic_registration() {
        let pool = test_pool().await;

        let mapping = couples(&[(1, 10), (2, 20), (3, 30)]);
        let song_id =
            register_song_with_fingerprints(&pool, "Song", "Artist", &mapping)
                .await
                .unwrap();

        assert_eq!(songs::total_songs(&pool).await.unwrap(), 1);
        assert_eq!(fingerprints::total_fingerprints(&pool).await.unwrap(), 3);

        let song = songs::get_song(&pool, song_id).await.unwrap();
        assert_eq!(song.title, "Song");
    }

    #[tokio::test]
    async fn test_duplicate_registration_writes_nothing() {
        let pool = test_pool().await;

        let mapping = couples(&[(1, 10), (2, 20)]);
        register_song_with_fingerprints(&pool, "Song", "Artist", &mapping)
            .await
            .unwrap();

        let second = couples(&[(7, 70), (8, 80), (9, 90)]);
        let err = register_song_with_fingerprints(&pool, "Song", "Artist", &second)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_)));

        // The failed attempt must not have touched either table.
        assert_eq!(songs::total_songs(&pool).await.unwrap(), 1);
        assert_eq!(fingerprints::total_fingerprints(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_song_cascades_to_fingerprints() {
        let pool = test_pool().await;

        let mapping = couples(&[(1, 10), (2, 20)]);
        let song_id = register_song_with_fingerprints(&pool, "Song", "Artist", &mapping)
            .await
            .unwrap();

        songs::delete_song(&pool, song_id).await.unwrap();

        assert_eq!(songs::total_songs(&pool).await.unwrap(), 0);
        assert_eq!(fingerprints::total_fingerprints(&pool).await.unwrap(), 0);
    }
}
