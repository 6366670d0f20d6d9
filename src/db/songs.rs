//! Songs table operations

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

/// A registered song
#[derive(Debug, Clone)]
pub struct Song {
    pub id: u32,
    pub title: String,
    pub artist: String,
}

/// Catalog key for a title/artist pair.
///
/// Both strings are trimmed and lowercased, joined as "artist-title", and
/// hashed with SHA-256; the hex digest is what the unique constraint guards.
pub fn song_key(title: &str, artist: &str) -> String {
    let input = format!(
        "{}-{}",
        artist.trim().to_lowercase(),
        title.trim().to_lowercase()
    );
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// Insert a new song row and return its generated id.
///
/// Fails with `DuplicateKey` when a song with the same normalized key is
/// already registered.
pub async fn register_song(pool: &SqlitePool, title: &str, artist: &str) -> Result<u32> {
    let key = song_key(title, artist);

    let id: i64 =
        sqlx::query_scalar("INSERT INTO songs (title, artist, key) VALUES (?, ?, ?) RETURNING id")
            .bind(title)
            .bind(artist)
            .bind(&key)
            .fetch_one(pool)
            .await
            .map_err(|e| map_unique_violation(e, &key))?;

    Ok(id as u32)
}

/// Translate a unique-constraint violation into `DuplicateKey`.
pub(crate) fn map_unique_violation(e: sqlx::Error, key: &str) -> Error {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::DuplicateKey(key.to_string())
        }
        _ => Error::Database(e),
    }
}

/// Load a song by id.
pub async fn get_song(pool: &SqlitePool, song_id: u32) -> Result<Song> {
    let row = sqlx::query("SELECT id, title, artist FROM songs WHERE id = ?")
        .bind(song_id as i64)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Song {
            id: row.get::<i64, _>("id") as u32,
            title: row.get("title"),
            artist: row.get("artist"),
        }),
        None => Err(Error::NotFound(format!("song {}", song_id))),
    }
}

/// Load a song by its catalog key. Used for idempotent ingest.
pub async fn get_song_by_key(pool: &SqlitePool, key: &str) -> Result<Song> {
    let row = sqlx::query("SELECT id, title, artist FROM songs WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Song {
            id: row.get::<i64, _>("id") as u32,
            title: row.get("title"),
            artist: row.get("artist"),
        }),
        None => Err(Error::NotFound(format!("song key {}", key))),
    }
}

/// Delete a song row. Fingerprint rows go with it via the cascading
/// foreign key.
pub async fn delete_song(pool: &SqlitePool, song_id: u32) -> Result<()> {
    sqlx::query("DELETE FROM songs WHERE id = ?")
        .bind(song_id as i64)
        .execute(pool)
        .await?;

    Ok(())
}

/// Number of songs in the catalog.
pub async fn total_songs(pool: &SqlitePool) -> Result<u64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM songs")
        .fetch_one(pool)
        .await?;

    Ok(count as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> SqlitePool {
        crate::db::init_pool("sqlite::memory:").await.unwrap()
    }

    #[test]
    fn test_song_key_normalizes_case_and_whitespace() {
        let a = song_key("Yesterday", "The Beatles");
        let b = song_key("  yesterday ", " the beatles");
        assert_eq!(a, b);
        // SHA-256 hex digest
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_song_key_distinguishes_tracks() {
        assert_ne!(
            song_key("Yesterday", "The Beatles"),
            song_key("Help", "The Beatles")
        );
    }

    #[tokio::test]
    async fn test_register_and_get_song() {
        let pool = test_pool().await;

        let id = register_song(&pool, "White Teeth", "Ryan Beatty")
            .await
            .unwrap();
        let song = get_song(&pool, id).await.unwrap();
        assert_eq!(song.title, "White Teeth");
        assert_eq!(song.artist, "Ryan Beatty");
        assert_eq!(total_songs(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_fails() {
        let pool = test_pool().await;

        register_song(&pool, "Song", "Artist").await.unwrap();
        let err = register_song(&pool, " song ", "ARTIST").await.unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_)));
        assert_eq!(total_songs(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_song_by_key() {
        let pool = test_pool().await;

        let id = register_song(&pool, "Song", "Artist").await.unwrap();
        let song = get_song_by_key(&pool, &song_key("Song", "Artist"))
            .await
            .unwrap();
        assert_eq!(song.id, id);

        let missing = get_song_by_key(&pool, &song_key("Other", "Artist")).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_missing_song() {
        let pool = test_pool().await;
        assert!(matches!(
            get_song(&pool, 42).await,
            Err(Error::NotFound(_))
        ));
    }
}
