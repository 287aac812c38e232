//! Shared test fixtures.
//!
//! Only compiled for tests (`#[cfg(test)]` on the module declaration).

use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::db;
use crate::model::{NewAlbum, NewArtist, NewTrack};
use crate::remote::{RemoteAlbum, RemoteArtist, RemoteTrack};

/// Create a migrated database in a temp directory.
///
/// Returns the pool and the directory guard; keep the guard alive for the
/// duration of the test.
pub async fn temp_db() -> (SqlitePool, TempDir) {
    let dir = TempDir::new().expect("create temp dir");
    let db_path = dir.path().join("test.db");
    let pool = db::init_db(&db_path).await.expect("init test db");
    (pool, dir)
}

pub fn new_artist(key: &str, name: &str) -> NewArtist {
    NewArtist {
        external_key: key.to_string(),
        name: name.to_string(),
        genre: None,
        bio: None,
    }
}

pub fn new_album(key: &str, title: &str, artist_id: i64) -> NewAlbum {
    NewAlbum {
        external_key: key.to_string(),
        title: title.to_string(),
        artist_id,
        year: None,
        genre: None,
        cover_url: None,
    }
}

pub fn new_track(key: &str, title: &str, artist_id: i64, album_id: i64) -> NewTrack {
    NewTrack {
        external_key: key.to_string(),
        title: title.to_string(),
        artist_id,
        album_id,
        duration: Some(200),
        genre: None,
        year: None,
        rating: None,
        play_count: 0,
        last_played: None,
        tags: None,
        environments: None,
        instruments: None,
    }
}

pub fn remote_artist(key: &str, name: &str) -> RemoteArtist {
    RemoteArtist {
        key: key.to_string(),
        name: name.to_string(),
        genre: None,
        bio: None,
    }
}

pub fn remote_album(key: &str, title: &str, artist_key: Option<&str>) -> RemoteAlbum {
    RemoteAlbum {
        key: key.to_string(),
        title: title.to_string(),
        artist_key: artist_key.map(String::from),
        year: None,
        genre: None,
        cover_url: None,
    }
}

pub fn remote_track(key: &str, title: &str, artist_key: &str, album_key: &str) -> RemoteTrack {
    RemoteTrack {
        key: key.to_string(),
        title: title.to_string(),
        artist_key: Some(artist_key.to_string()),
        album_key: Some(album_key.to_string()),
        duration: Some(200),
        genre: None,
        year: None,
        rating: None,
        play_count: 0,
        last_played: None,
    }
}
