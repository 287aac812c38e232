//! HTTP client for a Plex-compatible media server.
//!
//! All listing endpoints go through `/library/all` with a numeric item type
//! (8 = artist, 9 = album, 10 = track). The server wants the auth token in
//! the `X-Plex-Token` header and returns XML unless asked for JSON.

use chrono::{DateTime, Utc};

use super::{adapter, dto, RemoteAlbum, RemoteArtist, RemoteError, RemoteTrack};

const ARTIST_TYPE: u8 = 8;
const ALBUM_TYPE: u8 = 9;
const TRACK_TYPE: u8 = 10;

/// Media server API client
pub struct MediaServerClient {
    http_client: reqwest::Client,
    base_url: String,
    token: String,
}

impl MediaServerClient {
    /// Create a new client for the given server.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("MoodMixer/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Create a client for testing with a custom base URL.
    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self::new(base_url, "test-token")
    }

    pub async fn list_artists(&self) -> Result<Vec<RemoteArtist>, RemoteError> {
        let items = self.list_items(ARTIST_TYPE, None).await?;
        Ok(items.into_iter().map(adapter::to_artist).collect())
    }

    pub async fn list_albums(&self) -> Result<Vec<RemoteAlbum>, RemoteError> {
        let items = self.list_items(ALBUM_TYPE, None).await?;
        Ok(items.into_iter().map(adapter::to_album).collect())
    }

    pub async fn list_tracks(&self) -> Result<Vec<RemoteTrack>, RemoteError> {
        let items = self.list_items(TRACK_TYPE, None).await?;
        Ok(items.into_iter().map(adapter::to_track).collect())
    }

    /// Tracks added or modified on the server after `since`.
    pub async fn list_tracks_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<RemoteTrack>, RemoteError> {
        let items = self.list_items(TRACK_TYPE, Some(since.timestamp())).await?;
        Ok(items.into_iter().map(adapter::to_track).collect())
    }

    /// Create a playlist on the server from ordered track keys.
    ///
    /// Returns the server-assigned playlist key.
    pub async fn create_playlist(
        &self,
        name: &str,
        track_keys: &[String],
        description: Option<&str>,
    ) -> Result<String, RemoteError> {
        // Playlist creation addresses items through a library URI
        let uri = format!(
            "server://local/com.plexapp.plugins.library/library/metadata/{}",
            track_keys.join(",")
        );
        let url = format!(
            "{}/playlists?type=audio&smart=0&title={}&uri={}",
            self.base_url,
            urlencoding::encode(name),
            urlencoding::encode(&uri)
        );

        let response = self
            .http_client
            .post(&url)
            .header("X-Plex-Token", &self.token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let parsed: dto::ContainerResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;

        let key = parsed
            .container
            .metadata
            .into_iter()
            .next()
            .map(|m| m.rating_key)
            .ok_or_else(|| RemoteError::Parse("playlist response had no items".to_string()))?;

        if let Some(summary) = description {
            // Description is set with a follow-up update; failure here is
            // not worth failing the whole creation for.
            let update_url = format!(
                "{}/playlists/{}?summary={}",
                self.base_url,
                key,
                urlencoding::encode(summary)
            );
            let result = self
                .http_client
                .put(&update_url)
                .header("X-Plex-Token", &self.token)
                .send()
                .await;
            if let Err(e) = result {
                tracing::warn!("Failed to set playlist description: {}", e);
            }
        }

        Ok(key)
    }

    async fn list_items(
        &self,
        item_type: u8,
        updated_after: Option<i64>,
    ) -> Result<Vec<dto::MetadataItem>, RemoteError> {
        let url = format!("{}/library/all", self.base_url);
        let mut request = self
            .http_client
            .get(&url)
            .header("X-Plex-Token", &self.token)
            .header("Accept", "application/json")
            .query(&[("type", item_type.to_string())]);

        if let Some(ts) = updated_after {
            request = request.query(&[("updatedAt>>", ts.to_string())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let parsed: dto::ContainerResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;

        Ok(parsed.container.metadata)
    }

    /// Map HTTP status codes onto the error taxonomy.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(RemoteError::Unauthorized);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(
                response.url().path().to_string(),
            ));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RemoteError::RateLimited);
        }
        if !status.is_success() {
            if let Ok(error) = response.json::<dto::ApiError>().await {
                return Err(RemoteError::Api(error.error));
            }
            return Err(RemoteError::Api(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        Ok(response)
    }
}
