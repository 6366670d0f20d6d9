//! Error types for findr

use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the fingerprinting engine and its collaborators
#[derive(Debug, Error)]
pub enum Error {
    /// Bad WAVE header, wrong sample format, or corrupt audio data
    #[error("invalid audio: {0}")]
    InvalidAudio(String),

    /// Downsample rates that make no sense (zero, or target above original)
    #[error("invalid sample rate: original {original}, target {target}")]
    InvalidRate { original: u32, target: u32 },

    /// A song with the same normalized artist/title key is already registered
    #[error("song with key {0} already exists")]
    DuplicateKey(String),

    /// Requested song does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// A pipeline stage produced no data for the current track
    #[error("pipeline stage produced no data: {0}")]
    PipelineStageFailed(&'static str),

    /// The cancellation token fired between pipeline stages
    #[error("operation cancelled")]
    Cancelled,

    /// Store I/O or transaction failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or invalid environment configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Microphone capture failure
    #[error("capture error: {0}")]
    Capture(String),

    /// Metadata collaborator (Spotify) failure
    #[error("metadata error: {0}")]
    Metadata(String),

    /// Audio download or transcode failure
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Internal error (task join failures and other should-not-happen cases)
    #[error("internal error: {0}")]
    Internal(String),
}
