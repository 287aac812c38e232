//! Remote media-server integration.
//!
//! Talks to a Plex-compatible server over HTTP and maps its responses into
//! neutral domain records. The sync engine never sees wire types: the split
//! is client (HTTP) → dto (wire shapes) → adapter (wire → domain).

pub mod adapter;
pub mod client;
pub mod dto;
pub mod traits;

pub use client::MediaServerClient;
pub use traits::MediaServerApi;

/// An artist as reported by the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteArtist {
    /// Server-assigned stable key
    pub key: String,
    pub name: String,
    pub genre: Option<String>,
    pub bio: Option<String>,
}

/// An album as reported by the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAlbum {
    pub key: String,
    pub title: String,
    /// Key of the owning artist, when the server reports one
    pub artist_key: Option<String>,
    pub year: Option<i64>,
    pub genre: Option<String>,
    pub cover_url: Option<String>,
}

/// A track as reported by the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTrack {
    pub key: String,
    pub title: String,
    pub artist_key: Option<String>,
    pub album_key: Option<String>,
    /// Duration in seconds
    pub duration: Option<i64>,
    pub genre: Option<String>,
    pub year: Option<i64>,
    pub rating: Option<f64>,
    pub play_count: i64,
    /// RFC 3339 timestamp of the last play
    pub last_played: Option<String>,
}

/// Errors from the remote media service.
///
/// Connectivity failures are fatal to a sync pass; the engine aborts before
/// touching local entities.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    /// Network failure (connection refused, DNS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Server rejected the token
    #[error("Authentication failed (check the server token)")]
    Unauthorized,

    /// Requested resource does not exist
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Server asked us to slow down
    #[error("Rate limited by the media server")]
    RateLimited,

    /// Server returned an error payload
    #[error("Server error: {0}")]
    Api(String),

    /// Response body could not be parsed
    #[error("Failed to parse server response: {0}")]
    Parse(String),
}
