//! Spotify metadata collaborator
//!
//! Resolves track and playlist URLs into (title, artist, duration) using
//! the client-credentials flow. Access tokens are cached on disk as JSON
//! and refreshed once expired, so repeated ingests do not hammer the token
//! endpoint.

use crate::config::SpotifyCredentials;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";

/// Well-known location of the cached access token
pub const TOKEN_CACHE_PATH: &str = "token.json";

/// Track metadata as the ingest pipeline needs it
#[derive(Debug, Clone)]
pub struct Track {
    pub title: String,
    pub artist: String,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct ApiArtist {
    name: String,
}

#[derive(Deserialize)]
struct ApiTrack {
    name: String,
    artists: Vec<ApiArtist>,
    duration_ms: u64,
}

#[derive(Deserialize)]
struct PlaylistItem {
    track: Option<ApiTrack>,
}

#[derive(Deserialize)]
struct PlaylistPage {
    items: Vec<PlaylistItem>,
    next: Option<String>,
}

/// Client for the Spotify Web API
pub struct SpotifyClient {
    http: reqwest::Client,
    credentials: SpotifyCredentials,
}

impl SpotifyClient {
    pub fn new(credentials: SpotifyCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
        }
    }

    /// Resolve a track URL into its metadata.
    pub async fn track_from_url(&self, url: &str) -> Result<Track> {
        let id = resource_id(url, "track")?;
        let token = self.access_token().await?;

        let api_track: ApiTrack = self
            .get_json(&format!("{}/tracks/{}", API_BASE, id), &token)
            .await?;

        Ok(convert_track(api_track))
    }

    /// Resolve a playlist URL into the metadata of every track it holds.
    pub async fn playlist_from_url(&self, url: &str) -> Result<Vec<Track>> {
        let id = resource_id(url, "playlist")?;
        let token = self.access_token().await?;

        let mut tracks = Vec::new();
        let mut page_url = format!("{}/playlists/{}/tracks?limit=100", API_BASE, id);
        loop {
            let page: PlaylistPage = self.get_json(&page_url, &token).await?;
            tracks.extend(
                page.items
                    .into_iter()
                    .filter_map(|item| item.track)
                    .map(convert_track),
            );
            match page.next {
                Some(next) => page_url = next,
                None => break,
            }
        }

        info!(track_count = tracks.len(), "resolved playlist");
        Ok(tracks)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str, token: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Metadata(format!("request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::Metadata(format!(
                "request to {} failed with status {}",
                url,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Metadata(format!("decoding response from {} failed: {}", url, e)))
    }

    /// Return a valid access token, from the cache when possible.
    async fn access_token(&self) -> Result<String> {
        if let Some(token) = load_cached_token(Path::new(TOKEN_CACHE_PATH)) {
            debug!("using cached Spotify access token");
            return Ok(token);
        }

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Metadata(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Metadata(format!(
                "token request failed with status {}",
                response.status()
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Metadata(format!("decoding token response failed: {}", e)))?;

        if let Err(e) = save_token(
            Path::new(TOKEN_CACHE_PATH),
            &token_response.access_token,
            token_response.expires_in,
        ) {
            warn!("failed to cache access token: {}", e);
        }

        info!("retrieved new Spotify access token");
        Ok(token_response.access_token)
    }
}

fn convert_track(api_track: ApiTrack) -> Track {
    let artist = api_track
        .artists
        .first()
        .map(|a| a.name.clone())
        .unwrap_or_default();
    Track {
        title: api_track.name,
        artist,
        duration_ms: api_track.duration_ms,
    }
}

/// Extract the resource id from an open.spotify.com URL.
fn resource_id(url: &str, kind: &str) -> Result<String> {
    let marker = format!("{}/", kind);
    let id = url
        .split(&marker)
        .nth(1)
        .and_then(|rest| rest.split(['?', '/', '#']).next())
        .unwrap_or_default();

    if id.is_empty() {
        return Err(Error::Metadata(format!(
            "could not extract {} id from url {}",
            kind, url
        )));
    }

    Ok(id.to_string())
}

/// Read the cached token, returning it only while still valid.
fn load_cached_token(path: &Path) -> Option<String> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) => {
            debug!("could not read cached token file: {}", e);
            return None;
        }
    };

    let cached: CachedToken = match serde_json::from_str(&data) {
        Ok(cached) => cached,
        Err(e) => {
            warn!("could not parse cached token file: {}", e);
            return None;
        }
    };

    if Utc::now() >= cached.expires_at {
        debug!("cached token has expired");
        return None;
    }

    Some(cached.token)
}

/// Persist a fresh token next to its absolute expiry time.
fn save_token(path: &Path, token: &str, expires_in: i64) -> Result<()> {
    let cached = CachedToken {
        token: token.to_string(),
        expires_at: Utc::now() + chrono::Duration::seconds(expires_in),
    };
    let data = serde_json::to_string_pretty(&cached)
        .map_err(|e| Error::Metadata(format!("serializing token failed: {}", e)))?;
    std::fs::write(path, data)?;
    Ok(())
}
