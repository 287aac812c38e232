//! Core data models for the library mirror.
//!
//! Defines the primary entities: [`Artist`], [`Album`], [`Track`] and the
//! incoming-record types the sync engine upserts. These are derived from
//! SQLx for database mapping.
//!
//! The sticky-enrichment merge lives here, independent of storage, so it can
//! be unit tested directly: [`merge_track`] computes the effective row from
//! an existing row and an incoming record, and [`needs_update`] is the
//! change predicate the sync engine uses to count updates.

use sqlx::FromRow;

/// An artist in the library.
#[derive(Debug, Clone, FromRow)]
pub struct Artist {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Key assigned by the remote media service (unique, stable)
    pub external_key: String,
    /// Artist name
    pub name: String,
    /// Genre summary
    pub genre: Option<String>,
    /// Biography
    pub bio: Option<String>,
}

/// An album in the library.
#[derive(Debug, Clone, FromRow)]
pub struct Album {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Key assigned by the remote media service
    pub external_key: String,
    /// Album title
    pub title: String,
    /// Owning artist (must reference an existing artist)
    pub artist_id: i64,
    /// Release year
    pub year: Option<i64>,
    /// Genre
    pub genre: Option<String>,
    /// Cover art reference
    pub cover_url: Option<String>,
}

/// A track in the library, including AI-derived enrichment fields.
#[derive(Debug, Clone, FromRow)]
pub struct Track {
    /// Database ID (auto-generated, stable across re-syncs)
    pub id: i64,
    /// Key assigned by the remote media service
    pub external_key: String,
    /// Track title
    pub title: String,
    /// Foreign key to artists
    pub artist_id: i64,
    /// Foreign key to albums
    pub album_id: i64,
    /// Duration in seconds
    pub duration: Option<i64>,
    /// Genre
    pub genre: Option<String>,
    /// Release year
    pub year: Option<i64>,
    /// User rating
    pub rating: Option<f64>,
    /// Play count
    pub play_count: i64,
    /// Last played timestamp (RFC 3339)
    pub last_played: Option<String>,
    /// Descriptive tags, comma-separated (sticky)
    pub tags: Option<String>,
    /// Listening environments, comma-separated (sticky)
    pub environments: Option<String>,
    /// Primary/secondary instruments, comma-separated (sticky)
    pub instruments: Option<String>,
}

impl Track {
    /// Tags as a list, splitting on commas.
    pub fn tags_list(&self) -> Vec<String> {
        split_list(self.tags.as_deref())
    }

    /// Environments as a list.
    pub fn environments_list(&self) -> Vec<String> {
        split_list(self.environments.as_deref())
    }

    /// Instruments as a list.
    pub fn instruments_list(&self) -> Vec<String> {
        split_list(self.instruments.as_deref())
    }
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Join a list of values back into stored comma-separated form.
pub fn join_list(values: &[String]) -> Option<String> {
    if values.is_empty() {
        None
    } else {
        Some(values.join(","))
    }
}

/// An incoming artist record (no database ID yet).
#[derive(Debug, Clone)]
pub struct NewArtist {
    pub external_key: String,
    pub name: String,
    pub genre: Option<String>,
    pub bio: Option<String>,
}

/// An incoming album record.
#[derive(Debug, Clone)]
pub struct NewAlbum {
    pub external_key: String,
    pub title: String,
    pub artist_id: i64,
    pub year: Option<i64>,
    pub genre: Option<String>,
    pub cover_url: Option<String>,
}

/// An incoming track record, as produced by a sync pass or a tag update.
#[derive(Debug, Clone)]
pub struct NewTrack {
    pub external_key: String,
    pub title: String,
    pub artist_id: i64,
    pub album_id: i64,
    pub duration: Option<i64>,
    pub genre: Option<String>,
    pub year: Option<i64>,
    pub rating: Option<f64>,
    pub play_count: i64,
    pub last_played: Option<String>,
    pub tags: Option<String>,
    pub environments: Option<String>,
    pub instruments: Option<String>,
}

fn keep_if_empty(existing: &Option<String>, incoming: &Option<String>) -> Option<String> {
    match incoming {
        Some(v) if !v.trim().is_empty() => Some(v.clone()),
        _ => existing.clone(),
    }
}

/// Compute the effective row for an upsert of `incoming` over `existing`.
///
/// Field policy: the enrichment fields (tags, environments, instruments) are
/// keep-if-incoming-empty; every other field is overwrite-always. This is the
/// sticky-enrichment rule — a sync pass carrying no enrichment must never
/// erase previously generated values.
pub fn merge_track(existing: &Track, incoming: &NewTrack) -> NewTrack {
    NewTrack {
        tags: keep_if_empty(&existing.tags, &incoming.tags),
        environments: keep_if_empty(&existing.environments, &incoming.environments),
        instruments: keep_if_empty(&existing.instruments, &incoming.instruments),
        ..incoming.clone()
    }
}

/// Change predicate for sync counting: true iff any of rating, play count,
/// genre, year, duration or title differ between the stored row and the
/// incoming record.
pub fn needs_update(existing: &Track, incoming: &NewTrack) -> bool {
    existing.rating != incoming.rating
        || existing.play_count != incoming.play_count
        || existing.genre != incoming.genre
        || existing.year != incoming.year
        || existing.duration != incoming.duration
        || existing.title != incoming.title
}
