//! Converts wire types into domain records.

use chrono::{TimeZone, Utc};

use super::dto::MetadataItem;
use super::{RemoteAlbum, RemoteArtist, RemoteTrack};

/// Join a Plex genre tag list into the stored "A, B" form.
fn join_genres(item: &MetadataItem) -> Option<String> {
    if item.genres.is_empty() {
        return None;
    }
    Some(
        item.genres
            .iter()
            .map(|g| g.tag.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    )
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|s| !s.is_empty()).map(String::from)
}

pub fn to_artist(item: MetadataItem) -> RemoteArtist {
    RemoteArtist {
        genre: join_genres(&item),
        bio: non_empty(&item.summary),
        key: item.rating_key,
        name: item.title,
    }
}

pub fn to_album(item: MetadataItem) -> RemoteAlbum {
    RemoteAlbum {
        genre: join_genres(&item),
        artist_key: item.parent_rating_key,
        year: item.year,
        cover_url: non_empty(&item.thumb),
        key: item.rating_key,
        title: item.title,
    }
}

pub fn to_track(item: MetadataItem) -> RemoteTrack {
    RemoteTrack {
        genre: join_genres(&item),
        artist_key: item.grandparent_rating_key,
        album_key: item.parent_rating_key,
        // Server reports milliseconds
        duration: item.duration.map(|ms| ms / 1000),
        year: item.year,
        rating: item.user_rating,
        play_count: item.view_count.unwrap_or(0),
        last_played: item
            .last_viewed_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .map(|dt| dt.to_rfc3339()),
        key: item.rating_key,
        title: item.title,
    }
}
