//! Wire types for the Plex-compatible JSON API.
//!
//! Every listing response is a `MediaContainer` holding a `Metadata` array;
//! item kind is distinguished by which fields are populated. These structs
//! mirror the wire exactly and never leave this module family.

use serde::Deserialize;

/// Top-level envelope of every listing response.
#[derive(Debug, Deserialize)]
pub struct ContainerResponse {
    #[serde(rename = "MediaContainer")]
    pub container: MediaContainer,
}

#[derive(Debug, Deserialize)]
pub struct MediaContainer {
    #[serde(rename = "Metadata", default)]
    pub metadata: Vec<MetadataItem>,
}

/// One library item. Artists, albums and tracks share this shape; absent
/// fields deserialize to `None`.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct MetadataItem {
    /// Server-assigned stable key
    #[serde(rename = "ratingKey")]
    pub rating_key: String,

    pub title: String,

    /// Parent key: the album for a track, the artist for an album
    #[serde(rename = "parentRatingKey")]
    pub parent_rating_key: Option<String>,

    /// Grandparent key: the artist for a track
    #[serde(rename = "grandparentRatingKey")]
    pub grandparent_rating_key: Option<String>,

    #[serde(rename = "Genre")]
    pub genres: Vec<GenreTag>,

    /// Artist biography / album review
    pub summary: Option<String>,

    pub year: Option<i64>,

    /// Cover art path
    pub thumb: Option<String>,

    /// Duration in milliseconds
    pub duration: Option<i64>,

    #[serde(rename = "userRating")]
    pub user_rating: Option<f64>,

    #[serde(rename = "viewCount")]
    pub view_count: Option<i64>,

    /// Unix timestamp (seconds) of the last play
    #[serde(rename = "lastViewedAt")]
    pub last_viewed_at: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct GenreTag {
    pub tag: String,
}

/// Error payload some endpoints return on failure.
#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub error: String,
}
