//! Environment-backed configuration
//!
//! The store connection string and the Spotify client credentials are read
//! from the process environment. A `.env` file is honored when present.

use crate::error::{Error, Result};

/// Client-credentials pair for the Spotify Web API
#[derive(Debug, Clone)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection string for the fingerprint index
    pub database_url: String,
    /// Spotify credentials, present only when both variables are set
    pub spotify: Option<SpotifyCredentials>,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// `DATABASE_URL` is required; a missing value is a fatal startup error.
    /// Spotify credentials are optional here and validated by the operations
    /// that need them.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| Error::Config("DATABASE_URL environment variable not set".to_string()))?;

        let spotify = match (
            std::env::var("SPOTIFY_CLIENT_ID"),
            std::env::var("SPOTIFY_CLIENT_SECRET"),
        ) {
            (Ok(client_id), Ok(client_secret))
                if !client_id.trim().is_empty() && !client_secret.trim().is_empty() =>
            {
                Some(SpotifyCredentials {
                    client_id,
                    client_secret,
                })
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            spotify,
        })
    }

    /// Spotify credentials, or a configuration error for operations that
    /// cannot proceed without them.
    pub fn require_spotify(&self) -> Result<SpotifyCredentials> {
        self.spotify.clone().ok_or_else(|| {
            Error::Config(
                "SPOTIFY_CLIENT_ID or SPOTIFY_CLIENT_SECRET environment variables not set"
                    .to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_spotify_missing() {
        let config = Config {
            database_url: "sqlite::memory:".to_string(),
            spotify: None,
        };
        assert!(matches!(config.require_spotify(), Err(Error::Config(_))));
    }

    #[test]
    fn test_require_spotify_present() {
        let config = Config {
            database_url: "sqlite::memory:".to_string(),
            spotify: Some(SpotifyCredentials {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
            }),
        };
        let creds = config.require_spotify().unwrap();
        assert_eq!(creds.client_id, "id");
    }
}
