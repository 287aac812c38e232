//! Trait definition for the media-server client.
//!
//! The sync and playlist engines depend on this trait rather than the
//! concrete HTTP client so tests can substitute a scripted mock library.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{RemoteAlbum, RemoteArtist, RemoteError, RemoteTrack};

/// Read/write access to the remote media service.
#[async_trait]
pub trait MediaServerApi: Send + Sync {
    /// All artists in the library.
    async fn list_artists(&self) -> Result<Vec<RemoteArtist>, RemoteError>;

    /// All albums in the library.
    async fn list_albums(&self) -> Result<Vec<RemoteAlbum>, RemoteError>;

    /// All tracks in the library.
    async fn list_tracks(&self) -> Result<Vec<RemoteTrack>, RemoteError>;

    /// Tracks added or modified after `since`.
    async fn list_tracks_since(&self, since: DateTime<Utc>)
        -> Result<Vec<RemoteTrack>, RemoteError>;

    /// Create a playlist from ordered track keys; returns the remote key.
    async fn create_playlist(
        &self,
        name: &str,
        track_keys: &[String],
        description: Option<&str>,
    ) -> Result<String, RemoteError>;
}

#[async_trait]
impl MediaServerApi for super::client::MediaServerClient {
    async fn list_artists(&self) -> Result<Vec<RemoteArtist>, RemoteError> {
        self.list_artists().await
    }

    async fn list_albums(&self) -> Result<Vec<RemoteAlbum>, RemoteError> {
        self.list_albums().await
    }

    async fn list_tracks(&self) -> Result<Vec<RemoteTrack>, RemoteError> {
        self.list_tracks().await
    }

    async fn list_tracks_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<RemoteTrack>, RemoteError> {
        self.list_tracks_since(since).await
    }

    async fn create_playlist(
        &self,
        name: &str,
        track_keys: &[String],
        description: Option<&str>,
    ) -> Result<String, RemoteError> {
        self.create_playlist(name, track_keys, description).await
    }
}
